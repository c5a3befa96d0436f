// src/jobs/channel.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{freshness_cutoff, PipelineReport};
use crate::analyze::PostParser;
use crate::event::DomainEvent;
use crate::ingest::{guarded, http::DEFAULT_TIMEOUT, types::ChannelSource};
use crate::notify::Publisher;
use crate::scheduler::{Job, JobContext};

/// Reads recent posts of one channel and republishes the ones `P` recognizes.
pub struct ChannelJob<P> {
    name: String,
    source: Arc<dyn ChannelSource>,
    channel: String,
    limit: usize,
    parser: P,
    publisher: Arc<Publisher>,
    pacing: Duration,
    timeout: Duration,
}

impl<P> ChannelJob<P>
where
    P: PostParser + Send + Sync,
    P::Output: Into<DomainEvent>,
{
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn ChannelSource>,
        channel: impl Into<String>,
        parser: P,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            channel: channel.into(),
            limit: 20,
            parser,
            publisher,
            pacing: Duration::from_secs(2),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run_once(&self) -> PipelineReport {
        self.run_at(Utc::now()).await
    }

    /// Posts older than the dedup window are skipped: the channel buffer keeps
    /// them long after their fingerprint has expired.
    pub async fn run_at(&self, now: DateTime<Utc>) -> PipelineReport {
        let posts = guarded(
            &self.name,
            self.timeout,
            self.source.recent_posts(&self.channel, self.limit),
        )
        .await
        .unwrap_or_default();
        let fetched = posts.len();

        let cutoff = freshness_cutoff(&self.publisher, now);
        let fresh: Vec<_> = posts.iter().filter(|p| p.timestamp > cutoff).collect();
        let stale = fetched - fresh.len();
        if stale > 0 {
            tracing::debug!(job = %self.name, stale, %cutoff, "old posts skipped");
        }

        let events: Vec<DomainEvent> = fresh
            .into_iter()
            .filter_map(|p| self.parser.parse(p))
            .map(Into::into)
            .collect();
        let analyzed = events.len();
        if analyzed + stale < fetched {
            tracing::debug!(
                job = %self.name,
                skipped = fetched - stale - analyzed,
                "posts not recognized"
            );
        }

        let batch = self.publisher.publish_batch(events, self.pacing).await;
        PipelineReport::new(fetched, analyzed, batch).with_stale(stale)
    }
}

#[async_trait]
impl<P> Job for ChannelJob<P>
where
    P: PostParser + Send + Sync,
    P::Output: Into<DomainEvent>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        self.run_at(ctx.started_at).await.log(&self.name);
        Ok(())
    }
}
