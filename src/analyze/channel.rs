//! Parsers for third-party liquidation and whale-alert posts.
//!
//! These channels publish free text with no stable schema. Each parser is a
//! narrow adapter: it either recognizes a post and returns a structured event,
//! or returns `None`. A post that does not match is a normal outcome.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::ingest::types::ChannelPost;

pub trait PostParser {
    type Output;
    fn parse(&self, post: &ChannelPost) -> Option<Self::Output>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Long,
    Short,
}

/// Stable reference to the post an event was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRef {
    pub chat: String,
    pub message_id: i64,
    pub link: Option<String>,
    pub posted_at: DateTime<Utc>,
}

impl From<&ChannelPost> for PostRef {
    fn from(p: &ChannelPost) -> Self {
        Self {
            chat: p.chat.clone(),
            message_id: p.message_id,
            link: p.link.clone(),
            posted_at: p.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidationEvent {
    pub symbol: String,
    pub exchange: Option<String>,
    pub side: Side,
    pub amount_usd: f64,
    pub price: Option<f64>,
    pub post: PostRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhaleEvent {
    pub symbol: String,
    pub amount: f64,
    pub amount_usd: Option<f64>,
    pub action: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub tx_link: Option<String>,
    pub post: PostRef,
}

/// "2.1" + "M" -> 2_100_000
fn scaled(number: &str, unit: Option<&str>) -> Option<f64> {
    let base: f64 = number.replace(',', "").parse().ok()?;
    let mult = match unit.map(|u| u.to_ascii_uppercase()) {
        Some(u) if u == "K" => 1e3,
        Some(u) if u == "M" => 1e6,
        Some(u) if u == "B" => 1e9,
        _ => 1.0,
    };
    Some(base * mult)
}

fn clean_party(s: &str) -> String {
    s.trim().trim_start_matches('#').trim_end_matches('.').trim().to_string()
}

pub struct LiquidationParser {
    symbol: String,
    min_usd: f64,
    re_symbol: Regex,
    re_side: Regex,
    re_amount: Regex,
    re_price: Regex,
    re_exchange: Regex,
}

impl LiquidationParser {
    /// `symbol` is the base asset ("ETH"). Posts below `min_usd` are ignored.
    pub fn new(symbol: &str, min_usd: f64) -> Self {
        let sym = regex::escape(symbol);
        Self {
            symbol: symbol.to_ascii_uppercase(),
            min_usd,
            re_symbol: Regex::new(&format!(r"(?i)(?:^|[^\w])#?{sym}\b")).expect("symbol regex"),
            re_side: Regex::new(r"(?i)\b(long|short)s?\b").expect("side regex"),
            re_amount: Regex::new(
                r"(?i)(?:liquidat\w*|long|short)[^$\n]*\$\s?(?P<num>\d[\d,]*(?:\.\d+)?)\s*(?P<unit>[kmb])?\b",
            )
            .expect("amount regex"),
            re_price: Regex::new(r"(?i)\bat\s+\$\s?(?P<num>\d[\d,]*(?:\.\d+)?)")
                .expect("price regex"),
            re_exchange: Regex::new(
                r"(?i)\b(binance|bybit|okx|bitmex|deribit|hyperliquid|bitget|coinbase|kraken|bitfinex)\b",
            )
            .expect("exchange regex"),
        }
    }
}

impl PostParser for LiquidationParser {
    type Output = LiquidationEvent;

    fn parse(&self, post: &ChannelPost) -> Option<LiquidationEvent> {
        let text = post.text.as_str();
        if !text.to_lowercase().contains("liquidat") || !self.re_symbol.is_match(text) {
            return None;
        }
        let side = match self.re_side.captures(text)?[1].to_ascii_lowercase().as_str() {
            "long" => Side::Long,
            _ => Side::Short,
        };
        let caps = self.re_amount.captures(text)?;
        let amount_usd = scaled(&caps["num"], caps.name("unit").map(|m| m.as_str()))?;
        if amount_usd < self.min_usd {
            return None;
        }
        let price = self
            .re_price
            .captures(text)
            .and_then(|c| c["num"].replace(',', "").parse().ok());
        let exchange = self.re_exchange.captures(text).map(|c| {
            let raw = c[1].to_string();
            canonical_exchange(&raw)
        });

        Some(LiquidationEvent {
            symbol: self.symbol.clone(),
            exchange,
            side,
            amount_usd,
            price,
            post: post.into(),
        })
    }
}

fn canonical_exchange(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "okx" => "OKX".to_string(),
        "bitmex" => "BitMEX".to_string(),
        other => {
            let mut c = other.chars();
            match c.next() {
                Some(f) => f.to_uppercase().chain(c).collect(),
                None => String::new(),
            }
        }
    }
}

pub struct WhaleParser {
    symbol: String,
    min_usd: f64,
    re_transfer: Regex,
    re_link: Regex,
}

impl WhaleParser {
    pub fn new(symbol: &str, min_usd: f64) -> Self {
        let sym = regex::escape(symbol);
        Self {
            symbol: symbol.to_ascii_uppercase(),
            min_usd,
            // "24,500 #ETH (92,400,123 USD) transferred from #Binance to unknown wallet"
            re_transfer: Regex::new(&format!(
                r"(?i)(?P<amt>\d[\d,]*(?:\.\d+)?)\s+#?{sym}\b\s*(?:\(\s*(?P<usd>\d[\d,]*(?:\.\d+)?)\s*USD\s*\))?\s*(?P<action>transferred|minted|burned|locked|unlocked|moved)(?:\s+(?:from|at)\s+(?P<from>.+?))?(?:\s+to\s+(?P<to>.+?))?\s*$"
            ))
            .expect("whale regex"),
            re_link: Regex::new(r"https?://\S+").expect("link regex"),
        }
    }
}

impl PostParser for WhaleParser {
    type Output = WhaleEvent;

    fn parse(&self, post: &ChannelPost) -> Option<WhaleEvent> {
        let (caps, line) = post
            .text
            .lines()
            .find_map(|line| self.re_transfer.captures(line.trim()).map(|c| (c, line)))?;
        let amount = scaled(&caps["amt"], None)?;
        let amount_usd = caps.name("usd").and_then(|m| scaled(m.as_str(), None));
        // without a USD figure there is nothing to threshold on; keep it
        if amount_usd.is_some_and(|usd| usd < self.min_usd) {
            return None;
        }
        let tx_link = post
            .text
            .lines()
            .filter(|l| *l != line)
            .find_map(|l| self.re_link.find(l))
            .map(|m| m.as_str().to_string());

        Some(WhaleEvent {
            symbol: self.symbol.clone(),
            amount,
            amount_usd,
            action: caps["action"].to_lowercase(),
            from: caps.name("from").map(|m| clean_party(m.as_str())),
            to: caps.name("to").map(|m| clean_party(m.as_str())),
            tx_link,
            post: post.into(),
        })
    }
}
