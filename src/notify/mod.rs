// src/notify/mod.rs
//! Outbound delivery: the sink seam, message rendering and the pacing publisher.

pub mod format;
pub mod publisher;
pub mod telegram;

use serde::Serialize;
use std::fmt;

pub use crate::notify::format::{render, Markup, Rendered, RenderOptions, Rich};
pub use crate::notify::publisher::{BatchReport, Publisher};
pub use crate::notify::telegram::TelegramApi;

/// Where a message goes. The broadcast channel only ever receives events;
/// status and failure notices go to the admin chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Destination {
    Broadcast(String),
    Admin(String),
}

impl Destination {
    pub fn chat_id(&self) -> &str {
        match self {
            Destination::Broadcast(id) | Destination::Admin(id) => id,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Broadcast(id) => write!(f, "broadcast:{id}"),
            Destination::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutgoingMessage {
    Text {
        text: String,
        markup: Markup,
        disable_preview: bool,
    },
    /// Asset message. Captions are always plain text.
    Photo { url: String, caption: String },
}

impl OutgoingMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        OutgoingMessage::Text {
            text: text.into(),
            markup: Markup::Plain,
            disable_preview: true,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        OutgoingMessage::Text {
            text: text.into(),
            markup: Markup::Html,
            disable_preview: true,
        }
    }

    /// Text as it would appear to a reader, for logs and test assertions.
    pub fn body(&self) -> &str {
        match self {
            OutgoingMessage::Text { text, .. } => text,
            OutgoingMessage::Photo { caption, .. } => caption,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("delivery failed: {0}")]
    Other(String),
}

impl DeliveryError {
    pub fn reason(&self) -> &'static str {
        match self {
            DeliveryError::RateLimited { .. } => "rate_limited",
            DeliveryError::Forbidden(_) => "forbidden",
            DeliveryError::Other(_) => "other",
        }
    }
}

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, dest: &Destination, msg: &OutgoingMessage)
        -> Result<(), DeliveryError>;
}

/// Sink that only logs. Used in dry-run mode and by the demo binary.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait::async_trait]
impl Sink for LogSink {
    async fn send(
        &self,
        dest: &Destination,
        msg: &OutgoingMessage,
    ) -> Result<(), DeliveryError> {
        match msg {
            OutgoingMessage::Text { text, markup, .. } => {
                tracing::info!(%dest, ?markup, "dry-run send\n{text}");
            }
            OutgoingMessage::Photo { url, caption } => {
                tracing::info!(%dest, photo = %url, "dry-run send\n{caption}");
            }
        }
        Ok(())
    }
}

/// Best-effort admin notice (startup, shutdown, critical failures). Never fails the caller.
pub async fn notify_admin(sink: &dyn Sink, admin: &Destination, text: &str) {
    if let Err(e) = sink.send(admin, &OutgoingMessage::plain(text)).await {
        tracing::warn!(error = %e, %admin, "admin notice not delivered");
    }
}
