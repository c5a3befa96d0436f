//! Channel history as seen through the bot's own update stream.
//!
//! The Bot API has no "read channel history" call; a bot that is a member of a
//! channel receives its posts as `channel_post` updates. The update poller
//! (`crate::commands`) records those here and the channel jobs read the most
//! recent ones back through [`ChannelSource`].

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ingest::types::{ChannelPost, ChannelSource, FetchResult};

pub const DEFAULT_POSTS_PER_CHANNEL: usize = 100;

type Buffers = HashMap<String, VecDeque<ChannelPost>>;

#[derive(Debug, Clone)]
pub struct ChannelHistory {
    inner: Arc<Mutex<Buffers>>,
    cap: usize,
}

impl Default for ChannelHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_POSTS_PER_CHANNEL)
    }
}

impl ChannelHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            cap: cap.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffers> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Remember a post under its chat id and, when known, its `@username`.
    /// Posts without text are ignored; an edit replaces the earlier version.
    pub fn record(&self, post: ChannelPost, username: Option<&str>) {
        if post.text.trim().is_empty() {
            return;
        }
        let mut keys = vec![post.chat.clone()];
        if let Some(u) = username.filter(|u| !u.is_empty()) {
            keys.push(format!("@{}", u.trim_start_matches('@')).to_ascii_lowercase());
        }

        let mut bufs = self.lock();
        for key in keys {
            let buf = bufs.entry(key).or_default();
            if let Some(existing) = buf.iter_mut().find(|p| p.message_id == post.message_id) {
                *existing = post.clone();
                continue;
            }
            buf.push_back(post.clone());
            while buf.len() > self.cap {
                buf.pop_front();
            }
        }
    }

    pub fn len(&self, channel: &str) -> usize {
        self.lock().get(&channel_key(channel)).map_or(0, |b| b.len())
    }
}

fn channel_key(channel: &str) -> String {
    if channel.starts_with('@') {
        channel.to_ascii_lowercase()
    } else {
        channel.to_string()
    }
}

#[async_trait]
impl ChannelSource for ChannelHistory {
    async fn recent_posts(&self, channel: &str, limit: usize) -> FetchResult<Vec<ChannelPost>> {
        let bufs = self.lock();
        let Some(buf) = bufs.get(&channel_key(channel)) else {
            return Ok(Vec::new());
        };
        let skip = buf.len().saturating_sub(limit);
        Ok(buf.iter().skip(skip).cloned().collect())
    }
}
