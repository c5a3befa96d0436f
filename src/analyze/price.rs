//! Price-change monitor.
//!
//! The last observed price lives in a [`PriceCell`] owned by the scheduler and
//! handed to the price job. First observation only seeds the cell; every later
//! one overwrites it and raises an alert when the move exceeds the threshold.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

pub const DEFAULT_ALERT_PCT: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceObservation {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

/// Shared handle to the last observed price. Empty until the first successful fetch.
#[derive(Debug, Clone, Default)]
pub struct PriceCell {
    inner: Arc<Mutex<Option<PriceObservation>>>,
}

impl PriceCell {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<PriceObservation>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    pub fn snapshot(&self) -> Option<PriceObservation> {
        *self.lock()
    }

    /// Store `obs` and hand back what was there before, atomically.
    pub fn swap(&self, obs: PriceObservation) -> Option<PriceObservation> {
        self.lock().replace(obs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAlert {
    pub symbol: String,
    pub previous: f64,
    pub price: f64,
    pub change_pct: f64,
    pub at: DateTime<Utc>,
}

impl PriceAlert {
    /// Signed change with two decimals, e.g. `"3.33"` or `"-4.10"`.
    pub fn change_display(&self) -> String {
        format!("{:.2}", self.change_pct)
    }
}

#[derive(Debug, Clone)]
pub struct PriceMonitor {
    threshold_pct: f64,
}

impl Default for PriceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_PCT)
    }
}

impl PriceMonitor {
    pub fn new(threshold_pct: f64) -> Self {
        Self {
            threshold_pct: threshold_pct.abs(),
        }
    }

    pub fn observe(
        &self,
        cell: &PriceCell,
        symbol: &str,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<PriceAlert> {
        if !(price.is_finite() && price > 0.0) {
            tracing::debug!(symbol, price, "ignoring unusable price");
            return None;
        }
        let previous = cell.swap(PriceObservation {
            price,
            observed_at: now,
        })?;

        let change_pct = (price - previous.price) / previous.price * 100.0;
        if change_pct.abs() <= self.threshold_pct {
            return None;
        }
        Some(PriceAlert {
            symbol: symbol.to_string(),
            previous: previous.price,
            price,
            change_pct,
            at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_then_alert_then_quiet() {
        let cell = PriceCell::new();
        let m = PriceMonitor::default();
        let now = Utc::now();

        assert!(m.observe(&cell, "ETHUSDT", 3000.0, now).is_none());
        assert_eq!(cell.snapshot().map(|o| o.price), Some(3000.0));

        let alert = m.observe(&cell, "ETHUSDT", 3100.0, now).expect("alert");
        assert_eq!(alert.change_display(), "3.33");
        assert_eq!(alert.previous, 3000.0);

        assert!(m.observe(&cell, "ETHUSDT", 3105.0, now).is_none());
        assert_eq!(cell.snapshot().map(|o| o.price), Some(3105.0));
    }

    #[test]
    fn drops_alert_with_negative_sign() {
        let cell = PriceCell::new();
        let m = PriceMonitor::default();
        let now = Utc::now();
        m.observe(&cell, "ETHUSDT", 3000.0, now);
        let alert = m.observe(&cell, "ETHUSDT", 2880.0, now).expect("alert");
        assert_eq!(alert.change_display(), "-4.00");
    }

    #[test]
    fn bad_price_leaves_state_alone() {
        let cell = PriceCell::new();
        let m = PriceMonitor::default();
        assert!(m.observe(&cell, "ETHUSDT", f64::NAN, Utc::now()).is_none());
        assert!(cell.snapshot().is_none());
    }
}
