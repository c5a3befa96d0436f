// src/ingest/http.rs
//! Thin GET helpers shared by the HTTP-backed providers.
//!
//! Every call carries its own timeout and maps the failure into [`FetchError`]
//! so callers can branch on timeout / status / malformed payload.

use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{FetchError, FetchResult};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("eth-tracker-bot/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default reqwest client");
            reqwest::Client::new()
        })
}

fn map_transport(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout)
    } else if err.is_decode() {
        FetchError::malformed(err)
    } else {
        FetchError::Transport(err)
    }
}

async fn get_ok(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> FetchResult<reqwest::Response> {
    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_transport(e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(resp)
}

pub async fn get_text(client: &reqwest::Client, url: &str, timeout: Duration) -> FetchResult<String> {
    let resp = get_ok(client, url, timeout).await?;
    resp.text().await.map_err(|e| map_transport(e, timeout))
}

pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> FetchResult<T> {
    let body = get_text(client, url, timeout).await?;
    serde_json::from_str(body.trim()).map_err(FetchError::malformed)
}
