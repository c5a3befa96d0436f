// src/jobs/market.rs
//! Market-data jobs: closed-candle analysis, altseason index, price moves.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::{PipelineReport, JOB_ALTSEASON, JOB_CANDLE, JOB_PRICE};
use crate::analyze::{analyze_candle, last_closed, Altseason, PriceCell, PriceMonitor};
use crate::event::{AltseasonIndicator, DomainEvent};
use crate::ingest::types::{DominanceSource, MarketSource};
use crate::ingest::{guarded, http::DEFAULT_TIMEOUT};
use crate::notify::Publisher;
use crate::scheduler::{Job, JobContext};

/// Bars requested per run; enough to always include the last closed one.
const CANDLE_LOOKBACK: usize = 3;

pub struct CandleJob {
    market: Arc<dyn MarketSource>,
    symbol: String,
    timeframe: String,
    publisher: Arc<Publisher>,
    timeout: Duration,
}

impl CandleJob {
    pub fn new(
        market: Arc<dyn MarketSource>,
        symbol: impl Into<String>,
        timeframe: impl Into<String>,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            market,
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            publisher,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> PipelineReport {
        let candles = guarded(
            "binance.klines",
            self.timeout,
            self.market
                .candles(&self.symbol, &self.timeframe, CANDLE_LOOKBACK),
        )
        .await
        .unwrap_or_default();
        let fetched = candles.len();

        let events: Vec<DomainEvent> = last_closed(&candles, now)
            .and_then(|c| analyze_candle(&self.symbol, &self.timeframe, c))
            .map(DomainEvent::Candle)
            .into_iter()
            .collect();
        let analyzed = events.len();

        let batch = self.publisher.publish_batch(events, Duration::ZERO).await;
        PipelineReport::new(fetched, analyzed, batch)
    }
}

#[async_trait]
impl Job for CandleJob {
    fn name(&self) -> &str {
        JOB_CANDLE
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        self.run_at(ctx.started_at).await.log(JOB_CANDLE);
        Ok(())
    }
}

pub struct AltseasonJob {
    source: Arc<dyn DominanceSource>,
    publisher: Arc<Publisher>,
    timeout: Duration,
}

impl AltseasonJob {
    pub fn new(source: Arc<dyn DominanceSource>, publisher: Arc<Publisher>) -> Self {
        Self {
            source,
            publisher,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Unavailable readings are logged, not broadcast.
    pub async fn run_at(&self, now: DateTime<Utc>) -> PipelineReport {
        let snapshot = guarded("coingecko.global", self.timeout, self.source.dominance()).await;
        let fetched = usize::from(snapshot.is_some());

        let value = Altseason::from_dominance(snapshot.map(|s| s.btc_pct));
        let events = match value {
            Altseason::Unavailable => {
                tracing::warn!(job = JOB_ALTSEASON, "altseason index unavailable, skipping");
                Vec::new()
            }
            Altseason::Available { .. } => vec![DomainEvent::Altseason(AltseasonIndicator {
                date: now.date_naive(),
                value,
            })],
        };
        let analyzed = events.len();

        let batch = self.publisher.publish_batch(events, Duration::ZERO).await;
        PipelineReport::new(fetched, analyzed, batch)
    }
}

#[async_trait]
impl Job for AltseasonJob {
    fn name(&self) -> &str {
        JOB_ALTSEASON
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        self.run_at(ctx.started_at).await.log(JOB_ALTSEASON);
        Ok(())
    }
}

pub struct PriceJob {
    market: Arc<dyn MarketSource>,
    symbol: String,
    monitor: PriceMonitor,
    publisher: Arc<Publisher>,
    timeout: Duration,
}

impl PriceJob {
    pub fn new(
        market: Arc<dyn MarketSource>,
        symbol: impl Into<String>,
        monitor: PriceMonitor,
        publisher: Arc<Publisher>,
    ) -> Self {
        Self {
            market,
            symbol: symbol.into(),
            monitor,
            publisher,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The cell is the scheduler-owned price state; a failed fetch leaves it untouched.
    pub async fn run_with(&self, cell: &PriceCell, now: DateTime<Utc>) -> PipelineReport {
        let ticker = guarded("binance.ticker", self.timeout, self.market.ticker(&self.symbol)).await;
        let fetched = usize::from(ticker.is_some());

        let events: Vec<DomainEvent> = ticker
            .and_then(|t| self.monitor.observe(cell, &self.symbol, t.price, now))
            .map(DomainEvent::PriceAlert)
            .into_iter()
            .collect();
        let analyzed = events.len();

        let batch = self.publisher.publish_batch(events, Duration::ZERO).await;
        PipelineReport::new(fetched, analyzed, batch)
    }
}

#[async_trait]
impl Job for PriceJob {
    fn name(&self) -> &str {
        JOB_PRICE
    }

    async fn run(&self, ctx: &JobContext) -> Result<()> {
        self.run_with(&ctx.price, ctx.started_at).await.log(JOB_PRICE);
        Ok(())
    }
}
