// src/ingest/mod.rs
pub mod http;
pub mod providers;
pub mod types;

use crate::ingest::types::{FetchResult, NewsItem, NewsSource};
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::time::{Duration, Instant};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_records_total", "Records returned by sources.");
        describe_counter!(
            "fetch_errors_total",
            "Source calls that failed (timeout, status, malformed, transport)."
        );
        describe_histogram!("fetch_duration_ms", "Source call duration in milliseconds.");
    });
}

/// Normalize feed text: decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (CDATA-wrapped titles sometimes carry markup)
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 300 chars (titles only)
    if out.chars().count() > 300 {
        out = out.chars().take(300).collect();
    }

    out
}

/// Run one source call under a hard timeout. Any failure is logged, counted and
/// turned into `None`; nothing is propagated to the job.
pub async fn guarded<T, F>(source: &str, timeout: Duration, call: F) -> Option<T>
where
    F: Future<Output = FetchResult<T>>,
{
    ensure_metrics_described();
    let t0 = Instant::now();
    let res = tokio::time::timeout(timeout, call).await;
    metrics::histogram!("fetch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

    let err = match res {
        Ok(Ok(v)) => return Some(v),
        Ok(Err(e)) => e,
        Err(_) => types::FetchError::Timeout(timeout),
    };
    tracing::warn!(source, error = %err, "source fetch failed");
    counter!("fetch_errors_total", "source" => source.to_string(), "reason" => err.reason())
        .increment(1);
    None
}

/// Most recent `cap` items of a single feed. Items with a publish date are ordered
/// newest first; undated feeds keep document order.
pub fn most_recent(mut items: Vec<NewsItem>, cap: usize) -> Vec<NewsItem> {
    if items.iter().all(|it| it.published_at.is_some()) {
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    }
    items.truncate(cap);
    items
}

/// Fetch every news source once. Failed sources contribute nothing.
pub async fn collect_news(
    sources: &[Box<dyn NewsSource>],
    timeout: Duration,
    per_source_cap: usize,
) -> Vec<NewsItem> {
    let mut out = Vec::new();
    for src in sources {
        if let Some(items) = guarded(src.name(), timeout, src.fetch_latest()).await {
            let items = most_recent(items, per_source_cap);
            counter!("fetch_records_total", "source" => src.name().to_string())
                .increment(items.len() as u64);
            out.extend(items);
        }
    }
    out
}
