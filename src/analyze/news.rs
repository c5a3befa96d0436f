// src/analyze/news.rs
//! News importance tiering: a fixed keyword set, matched case-insensitively
//! against the title. Two tiers only.

use serde::Serialize;

use crate::ingest::types::NewsItem;

/// Keywords that lift a headline to [`Importance::Elevated`]. The tracked
/// entity's name is appended at construction.
pub const BASE_KEYWORDS: &[&str] = &[
    "hack",
    "exploit",
    "vulnerability",
    "critical",
    "emergency",
    "security",
    "attack",
    "bug",
    "hard fork",
    "upgrade",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Importance {
    Elevated,
    Normal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsEvent {
    pub item: NewsItem,
    pub importance: Importance,
    /// Keywords that matched, for logs.
    pub matched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewsClassifier {
    keywords: Vec<String>,
}

impl NewsClassifier {
    pub fn new(tracked_entity: &str) -> Self {
        let mut keywords: Vec<String> = BASE_KEYWORDS.iter().map(|k| k.to_string()).collect();
        let entity = tracked_entity.trim().to_lowercase();
        if !entity.is_empty() && !keywords.contains(&entity) {
            keywords.push(entity);
        }
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn matches(&self, title: &str) -> Vec<String> {
        let lower = title.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .cloned()
            .collect()
    }

    pub fn classify(&self, title: &str) -> Importance {
        importance(&self.matches(title))
    }

    pub fn analyze(&self, item: NewsItem) -> NewsEvent {
        let matched = self.matches(&item.title);
        let importance = importance(&matched);
        NewsEvent {
            item,
            importance,
            matched,
        }
    }
}

fn importance(matched: &[String]) -> Importance {
    if matched.is_empty() {
        Importance::Normal
    } else {
        Importance::Elevated
    }
}
