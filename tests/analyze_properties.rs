// tests/analyze_properties.rs
//
// Randomized checks of the pure analyzers and the dedup window.

use chrono::{Duration, TimeZone, Utc};
use rand::Rng;

use eth_tracker_bot::analyze::{
    analyze_candle, Altseason, AltseasonBand, Direction, Narrative, NewsClassifier, PriceCell,
    PriceMonitor,
};
use eth_tracker_bot::analyze::news::Importance;
use eth_tracker_bot::dedup::DedupCache;
use eth_tracker_bot::ingest::types::Candle;

fn candle(open: f64, close: f64) -> Candle {
    let t = Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap();
    Candle {
        open,
        high: open.max(close) * 1.01,
        low: open.min(close) * 0.99,
        close,
        open_time: t,
        close_time: t + Duration::hours(4) - Duration::milliseconds(1),
    }
}

#[test]
fn candle_narrative_matches_direction_and_body() {
    let mut rng = rand::rng();
    for _ in 0..2_000 {
        let open: f64 = rng.random_range(100.0..10_000.0);
        let move_pct: f64 = rng.random_range(-10.0..10.0);
        let close = open * (1.0 + move_pct / 100.0);
        let a = analyze_candle("ETHUSDT", "4h", candle(open, close)).expect("priced bar");

        let expected_body = (close - open).abs() / open * 100.0;
        assert!((a.body_pct - expected_body).abs() < 1e-9);
        let strong = a.body_pct > 3.0;
        let expected = match (close > open, strong) {
            (true, true) => Narrative::StrongBullish,
            (true, false) => Narrative::Bullish,
            (false, true) => Narrative::StrongBearish,
            (false, false) => Narrative::Bearish,
        };
        assert_eq!(a.narrative, expected, "open {open} close {close}");
        assert!(a.support <= a.candle.low);
        assert!(a.resistance >= a.candle.high);
    }
}

#[test]
fn candle_edges() {
    // strong up / mirrored strong down
    let up = analyze_candle("ETHUSDT", "4h", candle(100.0, 104.0)).unwrap();
    assert_eq!(up.narrative, Narrative::StrongBullish);
    let down = analyze_candle("ETHUSDT", "4h", candle(104.0, 100.0)).unwrap();
    assert_eq!(down.narrative, Narrative::StrongBearish);

    // exactly 3% is not strong; a flat bar counts as down
    let three = analyze_candle("ETHUSDT", "4h", candle(100.0, 103.0)).unwrap();
    assert_eq!(three.narrative, Narrative::Bullish);
    let flat = analyze_candle("ETHUSDT", "4h", candle(100.0, 100.0)).unwrap();
    assert_eq!(flat.direction, Direction::Down);
    assert_eq!(flat.narrative, Narrative::Bearish);

    assert!(analyze_candle("ETHUSDT", "4h", candle(0.0, 1.0)).is_none());
}

#[test]
fn altseason_score_is_complement_of_dominance() {
    let mut rng = rand::rng();
    for _ in 0..1_000 {
        let d: f64 = rng.random_range(0.0..=100.0);
        let a = Altseason::from_dominance(Some(d));
        assert_eq!(a.score(), Some(100.0 - d));
    }
    let band = |d: f64| match Altseason::from_dominance(Some(d)) {
        Altseason::Available { band, .. } => band,
        Altseason::Unavailable => panic!("unavailable"),
    };
    assert_eq!(band(75.0), AltseasonBand::Low); // score 25
    assert_eq!(band(55.0), AltseasonBand::Mid); // score 45
    assert_eq!(band(25.0), AltseasonBand::High); // score 75
    assert_eq!(Altseason::from_dominance(None), Altseason::Unavailable);
}

#[test]
fn price_monitor_sequence() {
    let cell = PriceCell::new();
    let m = PriceMonitor::default();
    let now = Utc::now();
    assert!(m.observe(&cell, "ETHUSDT", 3000.0, now).is_none());
    let alert = m.observe(&cell, "ETHUSDT", 3100.0, now).expect("alert");
    assert_eq!(alert.change_display(), "3.33");
    assert!(m.observe(&cell, "ETHUSDT", 3105.0, now).is_none());
    assert_eq!(cell.snapshot().map(|o| o.price), Some(3105.0));
}

#[test]
fn dedup_window_holds_for_random_fingerprints() {
    let mut rng = rand::rng();
    let ttl = Duration::seconds(3600);
    let t0 = Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap();

    // mark(f) then seen(f); gone once the TTL has elapsed
    for _ in 0..500 {
        let cache = DedupCache::new(ttl, 16);
        let fp = format!("news:https://x/{}", rng.random::<u64>());
        let at = t0 + Duration::seconds(rng.random_range(0..86_400));
        cache.mark_at(&fp, at);
        assert!(cache.seen_at(&fp, at));
        assert!(cache.seen_at(&fp, at + ttl - Duration::seconds(1)));
        assert!(!cache.seen_at(&fp, at + ttl));
    }

    // a shared cache: all live inside the window, all swept after it
    let cache = DedupCache::new(ttl, 10_000);
    let fps: Vec<String> = (0..500).map(|i| format!("whale:-100/{i}")).collect();
    for fp in &fps {
        cache.mark_at(fp, t0 + Duration::seconds(rng.random_range(0..600)));
    }
    let inside = t0 + Duration::seconds(600);
    assert!(fps.iter().all(|fp| cache.seen_at(fp, inside)));
    assert_eq!(cache.sweep_at(inside + ttl), 500);
    assert!(cache.is_empty());
}

#[test]
fn classifier_is_case_insensitive() {
    let c = NewsClassifier::new("Ethereum");
    assert_eq!(c.classify("CRITICAL BUG in client"), Importance::Elevated);
    assert_eq!(c.classify("ethereum foundation grants"), Importance::Elevated);
    assert_eq!(c.classify("Bitcoin rallies to new high"), Importance::Normal);
}
