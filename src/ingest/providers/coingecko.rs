//! CoinGecko `/global` market-dominance stats.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::ingest::http::{build_client, get_json, DEFAULT_TIMEOUT};
use crate::ingest::types::{DominanceSnapshot, DominanceSource, FetchError, FetchResult};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com";

#[derive(Debug, Deserialize)]
struct GlobalResp {
    data: GlobalData,
}

#[derive(Debug, Deserialize)]
struct GlobalData {
    market_cap_percentage: HashMap<String, f64>,
}

pub struct CoinGeckoGlobal {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl CoinGeckoGlobal {
    pub fn new() -> Self {
        Self::with_base_url(COINGECKO_API_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout),
            timeout,
        }
    }
}

impl Default for CoinGeckoGlobal {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_global(body: &str) -> FetchResult<DominanceSnapshot> {
    let resp: GlobalResp = serde_json::from_str(body.trim()).map_err(FetchError::malformed)?;
    snapshot(resp)
}

fn snapshot(resp: GlobalResp) -> FetchResult<DominanceSnapshot> {
    let btc = resp
        .data
        .market_cap_percentage
        .get("btc")
        .copied()
        .ok_or_else(|| FetchError::malformed("btc share missing"))?;
    if !(0.0..=100.0).contains(&btc) {
        return Err(FetchError::malformed(format!("btc share out of range: {btc}")));
    }
    Ok(DominanceSnapshot { btc_pct: btc })
}

#[async_trait]
impl DominanceSource for CoinGeckoGlobal {
    async fn dominance(&self) -> FetchResult<DominanceSnapshot> {
        let url = format!("{}/api/v3/global", self.base_url);
        let resp: GlobalResp = get_json(&self.client, &url, self.timeout).await?;
        snapshot(resp)
    }
}
