// src/analyze/mod.rs
//! Pure analyzers: raw records in, classified domain values out. No I/O.

pub mod altseason;
pub mod candle;
pub mod channel;
pub mod news;
pub mod price;

// Re-export convenient types.
pub use crate::analyze::altseason::{Altseason, AltseasonBand};
pub use crate::analyze::candle::{analyze_candle, last_closed, CandleAnalysis, Direction, Narrative};
pub use crate::analyze::channel::{
    LiquidationEvent, LiquidationParser, PostParser, PostRef, Side, WhaleEvent, WhaleParser,
};
pub use crate::analyze::news::{Importance, NewsClassifier, NewsEvent};
pub use crate::analyze::price::{PriceAlert, PriceCell, PriceMonitor, PriceObservation};
