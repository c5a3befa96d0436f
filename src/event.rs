//! Domain events: the closed set of things the bot publishes.
//!
//! Every event has a fingerprint `"<tag>:<key>"`. The key is built only from
//! fields that identify the logical event, so a retry of the same event yields
//! the same fingerprint. The tag prefix keeps different kinds from colliding.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

use crate::analyze::{
    Altseason, CandleAnalysis, LiquidationEvent, NewsEvent, PostRef, PriceAlert, WhaleEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    News,
    Candle,
    Altseason,
    PriceAlert,
    Liquidation,
    Whale,
}

impl EventKind {
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::News => "news",
            EventKind::Candle => "candle",
            EventKind::Altseason => "altseason",
            EventKind::PriceAlert => "price",
            EventKind::Liquidation => "liquidation",
            EventKind::Whale => "whale",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Altseason reading for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AltseasonIndicator {
    pub date: NaiveDate,
    pub value: Altseason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DomainEvent {
    News(NewsEvent),
    Candle(CandleAnalysis),
    Altseason(AltseasonIndicator),
    PriceAlert(PriceAlert),
    Liquidation(LiquidationEvent),
    Whale(WhaleEvent),
}

impl From<LiquidationEvent> for DomainEvent {
    fn from(e: LiquidationEvent) -> Self {
        DomainEvent::Liquidation(e)
    }
}

impl From<WhaleEvent> for DomainEvent {
    fn from(e: WhaleEvent) -> Self {
        DomainEvent::Whale(e)
    }
}

fn post_key(post: &PostRef) -> String {
    format!("{}/{}", post.chat, post.message_id)
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::News(_) => EventKind::News,
            DomainEvent::Candle(_) => EventKind::Candle,
            DomainEvent::Altseason(_) => EventKind::Altseason,
            DomainEvent::PriceAlert(_) => EventKind::PriceAlert,
            DomainEvent::Liquidation(_) => EventKind::Liquidation,
            DomainEvent::Whale(_) => EventKind::Whale,
        }
    }

    fn key(&self) -> String {
        match self {
            DomainEvent::News(n) => n.item.link.trim().to_string(),
            DomainEvent::Candle(c) => format!(
                "{}:{}:{}",
                c.symbol,
                c.timeframe,
                c.candle.open_time.timestamp()
            ),
            DomainEvent::Altseason(a) => match a.value.score() {
                Some(score) => format!("{}:{:.0}", a.date, score),
                None => format!("{}:na", a.date),
            },
            // quantized: whole-dollar price plus delta at display precision
            DomainEvent::PriceAlert(p) => {
                format!("{}:{:.0}:{}", p.symbol, p.price, p.change_display())
            }
            DomainEvent::Liquidation(l) => post_key(&l.post),
            DomainEvent::Whale(w) => post_key(&w.post),
        }
    }

    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.kind().tag(), self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{NewsClassifier, PriceCell, PriceMonitor};
    use crate::ingest::types::NewsItem;
    use chrono::Utc;

    fn news(link: &str, title: &str) -> DomainEvent {
        DomainEvent::News(NewsClassifier::new("Ethereum").analyze(NewsItem {
            source: "CoinDesk".into(),
            title: title.into(),
            link: link.into(),
            published_at: None,
        }))
    }

    #[test]
    fn news_fingerprint_follows_link_not_title() {
        let a = news("https://x/1", "Title");
        let b = news("https://x/1", "Title (updated)");
        let c = news("https://x/2", "Title");
        assert_eq!(a.fingerprint(), "news:https://x/1");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn price_fingerprint_is_quantized() {
        let cell = PriceCell::new();
        let m = PriceMonitor::default();
        let now = Utc::now();
        m.observe(&cell, "ETHUSDT", 3000.0, now);
        let alert = m.observe(&cell, "ETHUSDT", 3100.2, now).unwrap();
        let fp = DomainEvent::PriceAlert(alert).fingerprint();
        assert_eq!(fp, "price:ETHUSDT:3100:3.34");
    }

    #[test]
    fn kinds_are_namespaced() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let ev = DomainEvent::Altseason(AltseasonIndicator {
            date,
            value: Altseason::from_dominance(Some(55.0)),
        });
        assert_eq!(ev.fingerprint(), "altseason:2025-03-04:45");
        assert!(news("https://x/1", "t").fingerprint().starts_with("news:"));
    }
}
