//! Candle trend verdict for the most recently closed bar.
//!
//! Support/resistance are a fixed ±0.5% buffer around the bar's low/high,
//! not a statistical estimate.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ingest::types::Candle;

/// Body size (percent of open) above which a move counts as strong.
pub const STRONG_BODY_PCT: f64 = 3.0;
const SUPPORT_FACTOR: f64 = 0.995;
const RESISTANCE_FACTOR: f64 = 1.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Narrative {
    StrongBullish,
    Bullish,
    StrongBearish,
    Bearish,
}

impl Narrative {
    pub fn headline(self) -> &'static str {
        match self {
            Narrative::StrongBullish => "Strong bullish candle: buyers in full control",
            Narrative::Bullish => "Bullish candle: moderate upward pressure",
            Narrative::StrongBearish => "Strong bearish candle: sellers in full control",
            Narrative::Bearish => "Bearish candle: moderate downward pressure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleAnalysis {
    pub symbol: String,
    pub timeframe: String,
    pub candle: Candle,
    pub direction: Direction,
    pub body_pct: f64,
    pub narrative: Narrative,
    pub support: f64,
    pub resistance: f64,
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The latest bar whose close time is before `now`. The in-progress bar is never picked.
pub fn last_closed(candles: &[Candle], now: DateTime<Utc>) -> Option<Candle> {
    candles
        .iter()
        .filter(|c| c.is_closed_at(now))
        .max_by_key(|c| c.close_time)
        .copied()
}

pub fn classify(direction: Direction, body_pct: f64) -> Narrative {
    let strong = body_pct > STRONG_BODY_PCT;
    match (direction, strong) {
        (Direction::Up, true) => Narrative::StrongBullish,
        (Direction::Up, false) => Narrative::Bullish,
        (Direction::Down, true) => Narrative::StrongBearish,
        (Direction::Down, false) => Narrative::Bearish,
    }
}

/// Analyze one closed bar. Returns `None` for a bar that cannot be priced
/// (non-positive or non-finite open).
pub fn analyze_candle(symbol: &str, timeframe: &str, candle: Candle) -> Option<CandleAnalysis> {
    if !(candle.open.is_finite() && candle.open > 0.0 && candle.close.is_finite()) {
        return None;
    }
    let direction = if candle.close > candle.open {
        Direction::Up
    } else {
        Direction::Down
    };
    let body_pct = (candle.close - candle.open).abs() / candle.open * 100.0;

    Some(CandleAnalysis {
        symbol: symbol.to_string(),
        timeframe: timeframe.to_string(),
        candle,
        direction,
        body_pct,
        narrative: classify(direction, body_pct),
        support: round2(candle.low * SUPPORT_FACTOR),
        resistance: round2(candle.high * RESISTANCE_FACTOR),
    })
}
