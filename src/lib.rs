// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod dedup;
pub mod event;
pub mod ingest;
pub mod jobs;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod status;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::dedup::DedupCache;
pub use crate::event::{DomainEvent, EventKind};
pub use crate::notify::{Destination, OutgoingMessage, Publisher, Sink};
pub use crate::scheduler::{Job, JobContext, Scheduler, Trigger};
