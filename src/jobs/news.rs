// src/jobs/news.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{freshness_cutoff, PipelineReport, JOB_NEWS};
use crate::analyze::NewsClassifier;
use crate::event::DomainEvent;
use crate::ingest::{self, types::NewsSource};
use crate::notify::Publisher;
use crate::scheduler::{Job, JobContext};

pub struct NewsJob {
    sources: Vec<Box<dyn NewsSource>>,
    classifier: NewsClassifier,
    publisher: Arc<Publisher>,
    timeout: Duration,
    per_source_cap: usize,
    pacing: Duration,
}

impl NewsJob {
    pub fn new(
        sources: Vec<Box<dyn NewsSource>>,
        classifier: NewsClassifier,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            sources,
            classifier,
            publisher,
            timeout: ingest::http::DEFAULT_TIMEOUT,
            per_source_cap: 5,
            pacing: Duration::from_secs(3),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_per_source_cap(mut self, cap: usize) -> Self {
        self.per_source_cap = cap;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// One full pass over every source.
    pub async fn run_once(&self) -> PipelineReport {
        self.run_at(Utc::now()).await
    }

    /// Items dated before the dedup window are dropped; undated items always pass.
    pub async fn run_at(&self, now: DateTime<Utc>) -> PipelineReport {
        let items = ingest::collect_news(&self.sources, self.timeout, self.per_source_cap).await;
        let fetched = items.len();

        let cutoff = freshness_cutoff(&self.publisher, now);
        let (fresh, old): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|it| it.published_at.map_or(true, |t| t > cutoff));
        if !old.is_empty() {
            tracing::debug!(job = JOB_NEWS, stale = old.len(), %cutoff, "old items skipped");
        }

        let events: Vec<DomainEvent> = fresh
            .into_iter()
            .map(|it| DomainEvent::News(self.classifier.analyze(it)))
            .collect();
        let analyzed = events.len();

        let batch = self.publisher.publish_batch(events, self.pacing).await;
        PipelineReport::new(fetched, analyzed, batch).with_stale(old.len())
    }
}

#[async_trait]
impl Job for NewsJob {
    fn name(&self) -> &str {
        JOB_NEWS
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        self.run_at(ctx.started_at).await.log(JOB_NEWS);
        Ok(())
    }
}
