//! Binance spot REST: last price and klines.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::ingest::http::{build_client, get_json, get_text, DEFAULT_TIMEOUT};
use crate::ingest::types::{Candle, FetchError, FetchResult, MarketSource, Ticker};

pub const BINANCE_API_URL: &str = "https://api.binance.com";

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

pub struct BinanceMarket {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl BinanceMarket {
    pub fn new() -> Self {
        Self::with_base_url(BINANCE_API_URL, DEFAULT_TIMEOUT)
    }

    /// Point at another host (tests, regional mirrors).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout),
            timeout,
        }
    }
}

impl Default for BinanceMarket {
    fn default() -> Self {
        Self::new()
    }
}

fn num(v: &Value) -> Option<f64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn ms(v: &Value) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(v.as_i64()?).single()
}

/// Decode one kline row `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_kline(row: &[Value]) -> Option<Candle> {
    if row.len() < 7 {
        return None;
    }
    Some(Candle {
        open_time: ms(&row[0])?,
        open: num(&row[1])?,
        high: num(&row[2])?,
        low: num(&row[3])?,
        close: num(&row[4])?,
        close_time: ms(&row[6])?,
    })
}

/// Decode a klines payload. A row of unexpected shape fails the whole payload:
/// positional data with a hole in it cannot be trusted.
pub fn parse_klines(body: &str) -> FetchResult<Vec<Candle>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body.trim()).map_err(FetchError::malformed)?;
    rows.iter()
        .map(|r| parse_kline(r).ok_or_else(|| FetchError::malformed("unexpected kline row")))
        .collect()
}

#[async_trait]
impl MarketSource for BinanceMarket {
    async fn ticker(&self, symbol: &str) -> FetchResult<Ticker> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);
        let raw: TickerPrice = get_json(&self.client, &url, self.timeout).await?;
        let price: f64 = raw.price.parse().map_err(FetchError::malformed)?;
        if !price.is_finite() || price <= 0.0 {
            return Err(FetchError::malformed(format!("bad price {price}")));
        }
        Ok(Ticker {
            symbol: raw.symbol,
            price,
        })
    }

    async fn candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> FetchResult<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, timeframe, limit
        );
        let body = get_text(&self.client, &url, self.timeout).await?;
        parse_klines(&body)
    }
}
