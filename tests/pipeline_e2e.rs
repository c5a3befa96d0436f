// tests/pipeline_e2e.rs
//
// Fetch -> classify -> dedupe -> paced publish, end to end, against a recording sink.
// Time is paused so pacing gaps can be asserted exactly.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use eth_tracker_bot::analyze::NewsClassifier;
use eth_tracker_bot::dedup::DedupCache;
use eth_tracker_bot::ingest::providers::rss::RssFeedProvider;
use eth_tracker_bot::ingest::types::NewsSource;
use eth_tracker_bot::jobs::{NewsJob, PipelineReport};
use eth_tracker_bot::notify::{DeliveryError, Destination, OutgoingMessage, Publisher, Sink};

const FEED: &str = include_str!("fixtures/eth_news_rss.xml");

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(Instant, Destination, String)>>,
    /// Sends whose body contains this fail with `Other`.
    fail_on: Mutex<Option<String>>,
}

#[async_trait]
impl Sink for RecordingSink {
    async fn send(&self, dest: &Destination, msg: &OutgoingMessage) -> Result<(), DeliveryError> {
        if let Some(needle) = self.fail_on.lock().as_deref() {
            if msg.body().contains(needle) {
                return Err(DeliveryError::Other("boom".into()));
            }
        }
        self.sent
            .lock()
            .push((Instant::now(), dest.clone(), msg.body().to_string()));
        Ok(())
    }
}

fn feed() -> Vec<Box<dyn NewsSource>> {
    vec![Box::new(RssFeedProvider::from_fixture("CoinDesk", FEED))]
}

/// Half an hour after the newest fixture item.
fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 10, 30, 0).unwrap()
}

/// The fixture spans five hours, so the window is wide enough for all of it.
fn setup(pacing: Duration) -> (Arc<RecordingSink>, Arc<DedupCache>, NewsJob) {
    setup_with_ttl(pacing, chrono::Duration::hours(12))
}

fn setup_with_ttl(
    pacing: Duration,
    ttl: chrono::Duration,
) -> (Arc<RecordingSink>, Arc<DedupCache>, NewsJob) {
    let sink = Arc::new(RecordingSink::default());
    let cache = Arc::new(DedupCache::new(ttl, 4096));
    let publisher = Arc::new(Publisher::new(
        sink.clone(),
        cache.clone(),
        Destination::Broadcast("@eth_tracker".into()),
    ));
    let job = NewsJob::new(feed(), NewsClassifier::new("Ethereum"), publisher)
        .with_per_source_cap(5)
        .with_pacing(pacing);
    (sink, cache, job)
}

#[tokio::test(start_paused = true)]
async fn five_items_two_cached_three_published_with_pacing() {
    let pacing = Duration::from_secs(2);
    let (sink, cache, job) = setup(pacing);
    cache.mark("news:https://news.example/eth/etf-inflows");
    cache.mark("news:https://news.example/eth/l2-fees");

    let report = job.run_at(fixture_now()).await;
    assert_eq!(
        report,
        PipelineReport {
            fetched: 5,
            stale: 0,
            analyzed: 5,
            deduped: 2,
            published: 3,
            failed: 0,
        }
    );

    let sent = sink.sent.lock();
    assert_eq!(sent.len(), 3);
    // newest first, cached ones skipped
    assert!(sent[0].2.contains("Pectra hard fork"));
    assert!(sent[1].2.contains("restaking TVL"));
    assert!(sent[2].2.contains("Bridge exploit"));
    for pair in sent.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= pacing, "sends must be paced");
    }
    for (_, dest, _) in sent.iter() {
        assert_eq!(dest, &Destination::Broadcast("@eth_tracker".into()));
    }
}

#[tokio::test(start_paused = true)]
async fn same_link_twice_is_sent_once() {
    let (sink, _cache, job) = setup(Duration::from_millis(500));

    let first = job.run_at(fixture_now()).await;
    let second = job.run_at(fixture_now()).await;

    assert_eq!(first.published, 5);
    assert_eq!(second.published, 0);
    assert_eq!(second.deduped, 5);
    assert_eq!(sink.sent.lock().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn failed_send_does_not_stop_batch_and_is_retried_next_run() {
    let (sink, cache, job) = setup(Duration::from_secs(1));
    *sink.fail_on.lock() = Some("restaking".into());

    let first = job.run_at(fixture_now()).await;
    assert_eq!(first.published, 4);
    assert_eq!(first.failed, 1);
    assert!(!cache.seen("news:https://news.example/eth/restaking-tvl"));

    *sink.fail_on.lock() = None;
    let second = job.run_at(fixture_now()).await;
    assert_eq!(second.published, 1);
    assert_eq!(second.deduped, 4);
    assert!(sink
        .sent
        .lock()
        .last()
        .is_some_and(|(_, _, body)| body.contains("restaking TVL")));
}

#[tokio::test(start_paused = true)]
async fn urgent_news_gets_the_urgent_banner_and_escaped_html() {
    let (sink, _cache, job) = setup(Duration::ZERO);
    job.run_at(fixture_now()).await;

    let sent = sink.sent.lock();
    let exploit = sent
        .iter()
        .find(|(_, _, b)| b.contains("Bridge exploit"))
        .expect("exploit story sent");
    assert!(exploit.2.contains("<b>URGENT NEWS</b>"));
    assert!(exploit.2.contains("<a href=\"https://news.example/eth/bridge-exploit\">Read more</a>"));

    let lido = sent
        .iter()
        .find(|(_, _, b)| b.contains("restaking"))
        .expect("restaking story sent");
    assert!(lido.2.contains("Lido &amp; EigenLayer"));
    assert!(lido.2.starts_with("📰"));
}

#[tokio::test(start_paused = true)]
async fn items_older_than_the_dedup_window_are_not_published() {
    let (sink, cache, job) = setup_with_ttl(Duration::ZERO, chrono::Duration::hours(1));

    let report = job.run_at(fixture_now()).await;
    assert_eq!(report.fetched, 5);
    assert_eq!(report.stale, 4);
    assert_eq!(report.analyzed, 1);
    assert_eq!(report.published, 1);

    let sent = sink.sent.lock();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].2.contains("Pectra hard fork"));
    // never claimed, so nothing to expire and re-send later
    assert!(!cache.seen("news:https://news.example/eth/bridge-exploit"));
}
