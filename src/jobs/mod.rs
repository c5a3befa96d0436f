// src/jobs/mod.rs
//! Scheduled pipelines: fetch, analyze, dedupe, publish.
//!
//! Each job is an isolated failure domain. Source failures are absorbed by the
//! ingest layer and show up here as an empty fetch; delivery failures are
//! counted in the report. Neither fails the job.

pub mod channel;
pub mod market;
pub mod news;
pub mod sweep;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use crate::jobs::channel::ChannelJob;
pub use crate::jobs::market::{AltseasonJob, CandleJob, PriceJob};
pub use crate::jobs::news::NewsJob;
pub use crate::jobs::sweep::CacheSweepJob;

use crate::notify::{BatchReport, Publisher};

pub const JOB_NEWS: &str = "news";
pub const JOB_CANDLE: &str = "candle";
pub const JOB_ALTSEASON: &str = "altseason";
pub const JOB_PRICE: &str = "price";
pub const JOB_LIQUIDATION: &str = "liquidation";
pub const JOB_WHALE: &str = "whale";
pub const JOB_CACHE_SWEEP: &str = "cache_sweep";

/// Counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub fetched: usize,
    /// Fetched but older than the dedup window, dropped before analysis.
    pub stale: usize,
    pub analyzed: usize,
    pub deduped: usize,
    pub published: usize,
    pub failed: usize,
}

impl PipelineReport {
    pub fn new(fetched: usize, analyzed: usize, batch: BatchReport) -> Self {
        Self {
            fetched,
            stale: 0,
            analyzed,
            deduped: batch.deduped,
            published: batch.published,
            failed: batch.failed,
        }
    }

    pub fn with_stale(mut self, stale: usize) -> Self {
        self.stale = stale;
        self
    }

    pub fn log(&self, job: &str) {
        tracing::info!(
            job,
            fetched = self.fetched,
            stale = self.stale,
            analyzed = self.analyzed,
            deduped = self.deduped,
            published = self.published,
            failed = self.failed,
            "pipeline run"
        );
    }
}

/// Records timestamped at or before this instant are dropped. Their dedup
/// entry has expired (or is about to), so publishing them would repeat a
/// message once per TTL.
pub fn freshness_cutoff(publisher: &Publisher, now: DateTime<Utc>) -> DateTime<Utc> {
    now - publisher.cache().ttl()
}
