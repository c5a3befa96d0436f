// src/notify/publisher.rs
//! Dedup-aware, paced delivery of domain events.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;

use super::{render, DeliveryError, Destination, RenderOptions, Sink};
use crate::dedup::DedupCache;
use crate::event::DomainEvent;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("events_published_total", "Events delivered to the sink.");
        describe_counter!(
            "events_deduped_total",
            "Events dropped because their fingerprint was already delivered."
        );
        describe_counter!("delivery_failures_total", "Sink sends that failed.");
    });
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub published: usize,
    pub deduped: usize,
    pub failed: usize,
}

pub struct Publisher {
    sink: Arc<dyn Sink>,
    cache: Arc<DedupCache>,
    destination: Destination,
    render_opts: RenderOptions,
}

impl Publisher {
    pub fn new(sink: Arc<dyn Sink>, cache: Arc<DedupCache>, destination: Destination) -> Self {
        Self {
            sink,
            cache,
            destination,
            render_opts: RenderOptions::default(),
        }
    }

    pub fn with_render_options(mut self, opts: RenderOptions) -> Self {
        self.render_opts = opts;
        self
    }

    pub fn cache(&self) -> &Arc<DedupCache> {
        &self.cache
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Render and send one event. No dedup, no pacing.
    pub async fn publish(&self, event: &DomainEvent) -> Result<(), DeliveryError> {
        ensure_metrics_described();
        let msg = render(event, &self.render_opts).into_message();
        match self.sink.send(&self.destination, &msg).await {
            Ok(()) => {
                counter!("events_published_total", "kind" => event.kind().tag()).increment(1);
                Ok(())
            }
            Err(e) => {
                counter!("delivery_failures_total", "kind" => event.kind().tag(), "reason" => e.reason())
                    .increment(1);
                Err(e)
            }
        }
    }

    /// Publish a batch in order. Each event is claimed in the dedup cache before
    /// sending; already-delivered fingerprints are dropped. Consecutive sends are
    /// separated by `pacing`. A failed send is logged, its claim released so a
    /// later run can deliver it, and the batch goes on.
    pub async fn publish_batch(&self, events: Vec<DomainEvent>, pacing: Duration) -> BatchReport {
        ensure_metrics_described();
        let mut report = BatchReport::default();
        let mut sent_any = false;

        for event in events {
            let fp = event.fingerprint();
            if !self.cache.claim(&fp) {
                tracing::debug!(kind = %event.kind(), id = %short_id(&fp), "dedup drop");
                counter!("events_deduped_total", "kind" => event.kind().tag()).increment(1);
                report.deduped += 1;
                continue;
            }

            if sent_any && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }
            sent_any = true;

            match self.publish(&event).await {
                Ok(()) => {
                    tracing::info!(kind = %event.kind(), id = %short_id(&fp), dest = %self.destination, "published");
                    report.published += 1;
                }
                Err(e) => {
                    tracing::warn!(kind = %event.kind(), id = %short_id(&fp), error = %e, "delivery failed");
                    self.cache.release(&fp);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Short, stable id for logs (fingerprints may contain long URLs).
pub fn short_id(fingerprint: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(fingerprint.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
