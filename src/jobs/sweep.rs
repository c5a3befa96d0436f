// src/jobs/sweep.rs
use anyhow::Result;
use async_trait::async_trait;
use metrics::gauge;
use std::sync::Arc;

use super::JOB_CACHE_SWEEP;
use crate::dedup::DedupCache;
use crate::scheduler::{Job, JobContext};

/// Drops expired dedup entries so the cache does not sit at capacity.
pub struct CacheSweepJob {
    cache: Arc<DedupCache>,
}

impl CacheSweepJob {
    pub fn new(cache: Arc<DedupCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Job for CacheSweepJob {
    fn name(&self) -> &str {
        JOB_CACHE_SWEEP
    }

    async fn run(&self, _ctx: &JobContext) -> Result<()> {
        let evicted = self.cache.sweep();
        let size = self.cache.len();
        gauge!("dedup_cache_size").set(size as f64);
        tracing::debug!(evicted, size, "dedup cache swept");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::PriceCell;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn sweep_drops_only_expired_entries() {
        let cache = Arc::new(DedupCache::new(Duration::seconds(3600), 16));
        cache.mark_at("news:https://x/old", Utc::now() - Duration::hours(2));
        cache.mark("news:https://x/new");

        let ctx = JobContext {
            price: PriceCell::new(),
            started_at: Utc::now(),
        };
        CacheSweepJob::new(cache.clone()).run(&ctx).await.unwrap();

        assert_eq!(cache.len(), 1);
        assert!(cache.seen("news:https://x/new"));
    }
}
