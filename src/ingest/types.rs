// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a single source call produced nothing.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    pub fn malformed(err: impl std::fmt::Display) -> Self {
        Self::Malformed(err.to_string())
    }

    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Status(_) => "status",
            FetchError::Malformed(_) => "malformed",
            FetchError::Transport(_) => "transport",
        }
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub source: String, // e.g. "CoinDesk", "Cointelegraph"
    pub title: String,  // normalized title
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// One OHLC bar. `close_time` is the last millisecond the bar covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
}

impl Candle {
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.close_time < now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticker {
    pub symbol: String, // e.g. "ETHUSDT"
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DominanceSnapshot {
    /// BTC share of total crypto market cap, in percent.
    pub btc_pct: f64,
}

/// A text-bearing post read from a channel through the bot's own update stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelPost {
    pub chat: String,
    pub message_id: i64,
    pub text: String,
    pub link: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_latest(&self) -> FetchResult<Vec<NewsItem>>;
    fn name(&self) -> &str;
}

#[async_trait::async_trait]
pub trait MarketSource: Send + Sync {
    async fn ticker(&self, symbol: &str) -> FetchResult<Ticker>;

    /// Most recent candles for `symbol` on `timeframe` (e.g. "4h"), oldest first.
    /// May include the bar that is still in progress.
    async fn candles(&self, symbol: &str, timeframe: &str, limit: usize)
        -> FetchResult<Vec<Candle>>;
}

#[async_trait::async_trait]
pub trait DominanceSource: Send + Sync {
    async fn dominance(&self) -> FetchResult<DominanceSnapshot>;
}

#[async_trait::async_trait]
pub trait ChannelSource: Send + Sync {
    /// Most recent `limit` text-bearing posts of `channel`, oldest first.
    async fn recent_posts(&self, channel: &str, limit: usize) -> FetchResult<Vec<ChannelPost>>;
}
