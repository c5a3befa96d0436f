// src/status.rs
//! Point-in-time view of the bot, shared by the `/status` command and the ops API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::analyze::PriceObservation;
use crate::dedup::DedupCache;
use crate::jobs::{JOB_LIQUIDATION, JOB_WHALE};
use crate::notify::format::pair_label;
use crate::scheduler::{JobStatus, SchedulerHandle};

/// What the status surfaces need, cloned into handlers.
#[derive(Clone)]
pub struct StatusSource {
    pub scheduler: SchedulerHandle,
    pub cache: Arc<DedupCache>,
    pub symbol: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

impl StatusSource {
    pub fn snapshot(&self) -> StatusSnapshot {
        let now = Utc::now();
        StatusSnapshot {
            symbol: self.symbol.clone(),
            price: self.scheduler.price(),
            job_count: self.scheduler.job_count(),
            jobs: self.scheduler.status(),
            dedup_entries: self.cache.len(),
            dry_run: self.dry_run,
            uptime_secs: (now - self.started_at).num_seconds().max(0) as u64,
            generated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub symbol: String,
    pub price: Option<PriceObservation>,
    pub job_count: usize,
    pub jobs: Vec<JobStatus>,
    pub dedup_entries: usize,
    pub dry_run: bool,
    pub uptime_secs: u64,
    pub generated_at: DateTime<Utc>,
}

fn fmt_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "n/a".into())
}

impl StatusSnapshot {
    pub fn job(&self, name: &str) -> Option<&JobStatus> {
        self.jobs.iter().find(|j| j.name == name)
    }

    /// Plain-text rendering for the chat command.
    pub fn render_text(&self) -> String {
        let mut out = String::from("🤖 Bot status\n\n");
        match &self.price {
            Some(p) => {
                let _ = writeln!(
                    out,
                    "▫️ {}: ${:.2} (as of {})",
                    pair_label(&self.symbol),
                    p.price,
                    p.observed_at.format("%H:%M UTC")
                );
            }
            None => {
                let _ = writeln!(out, "▫️ {}: no price yet", pair_label(&self.symbol));
            }
        }
        let _ = writeln!(out, "▫️ Jobs registered: {}", self.job_count);
        for name in [JOB_LIQUIDATION, JOB_WHALE] {
            let next = self.job(name).and_then(|j| j.next_run);
            let _ = writeln!(out, "▫️ Next {name} check: {}", fmt_time(next));
        }
        out.push('\n');
        for j in &self.jobs {
            let state = if j.running { "running" } else { "idle" };
            let _ = writeln!(
                out,
                "• {} ({}) {state}, next {}, runs {}, failures {}",
                j.name,
                j.trigger,
                fmt_time(j.next_run),
                j.runs,
                j.failures
            );
        }
        if self.dry_run {
            out.push_str("\nDry-run: messages are logged, not sent.\n");
        }
        out.trim_end().to_string()
    }
}
