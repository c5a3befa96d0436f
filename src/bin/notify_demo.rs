//! Renders one sample of every event kind through the logging sink (no network).

use chrono::{Duration, Utc};
use std::sync::Arc;

use eth_tracker_bot::analyze::{
    analyze_candle, LiquidationParser, NewsClassifier, PostParser, PriceCell, PriceMonitor,
    WhaleParser,
};
use eth_tracker_bot::event::{AltseasonIndicator, DomainEvent};
use eth_tracker_bot::ingest::types::{Candle, ChannelPost, NewsItem};
use eth_tracker_bot::notify::{Destination, LogSink, Publisher};
use eth_tracker_bot::{analyze::Altseason, DedupCache};

fn samples() -> Vec<DomainEvent> {
    let now = Utc::now();
    let mut out = Vec::new();

    let classifier = NewsClassifier::new("Ethereum");
    out.push(DomainEvent::News(classifier.analyze(NewsItem {
        source: "CoinDesk".into(),
        title: "Vitalik Buterin proposes a major Ethereum network upgrade".into(),
        link: "https://example.com/eth-upgrade".into(),
        published_at: Some(now),
    })));

    let candle = Candle {
        open: 3700.0,
        high: 3830.0,
        low: 3690.0,
        close: 3785.42,
        open_time: now - Duration::hours(4),
        close_time: now - Duration::milliseconds(1),
    };
    if let Some(a) = analyze_candle("ETHUSDT", "4h", candle) {
        out.push(DomainEvent::Candle(a));
    }

    out.push(DomainEvent::Altseason(AltseasonIndicator {
        date: now.date_naive(),
        value: Altseason::from_dominance(Some(54.2)),
    }));

    let cell = PriceCell::new();
    let monitor = PriceMonitor::default();
    monitor.observe(&cell, "ETHUSDT", 3650.0, now);
    if let Some(alert) = monitor.observe(&cell, "ETHUSDT", 3785.42, now) {
        out.push(DomainEvent::PriceAlert(alert));
    }

    let post = |id: i64, text: &str| ChannelPost {
        chat: "-1001".into(),
        message_id: id,
        text: text.into(),
        link: Some(format!("https://t.me/demo/{id}")),
        timestamp: now,
    };
    let liq = post(
        1,
        "#ETH Long Liquidation on Binance: $2.1M at $3776.40",
    );
    if let Some(e) = LiquidationParser::new("ETH", 1_000_000.0).parse(&liq) {
        out.push(e.into());
    }
    let whale = post(
        2,
        "🚨 24,500 #ETH (92,400,123 USD) transferred from #Binance to unknown wallet\nhttps://etherscan.io/tx/0xabc",
    );
    if let Some(e) = WhaleParser::new("ETH", 1_000_000.0).parse(&whale) {
        out.push(e.into());
    }
    out
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let publisher = Publisher::new(
        Arc::new(LogSink),
        Arc::new(DedupCache::default()),
        Destination::Broadcast("@demo".into()),
    );
    let events = samples();
    let n = events.len();
    let report = publisher
        .publish_batch(events, std::time::Duration::from_millis(400))
        .await;

    println!("notify-demo done: {n} samples, {} published", report.published);
}
