// src/notify/format.rs
//! Rendering of domain events into the sink's markup.
//!
//! Telegram HTML allows a small tag subset; we only emit `<b>` and `<a>`, never
//! nested. Messages are built as [`Rich`] span lists so the same content can be
//! rendered as HTML for text messages or as plain text for photo captions.

use serde::Serialize;

use crate::analyze::{Altseason, Direction, Narrative, Side};
use crate::event::DomainEvent;
use crate::notify::OutgoingMessage;

/// Telegram caps photo captions at 1024 characters.
pub const CAPTION_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Markup {
    Html,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    Text(String),
    Bold(String),
    Link { label: String, url: String },
}

/// Flat sequence of styled spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rich {
    spans: Vec<Span>,
}

impl Rich {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, s: impl Into<String>) -> Self {
        self.spans.push(Span::Text(s.into()));
        self
    }

    pub fn bold(mut self, s: impl Into<String>) -> Self {
        self.spans.push(Span::Bold(s.into()));
        self
    }

    pub fn link(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.spans.push(Span::Link {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                Span::Text(t) => out.push_str(&html_escape::encode_text(t)),
                Span::Bold(t) => {
                    out.push_str("<b>");
                    out.push_str(&html_escape::encode_text(t));
                    out.push_str("</b>");
                }
                Span::Link { label, url } => {
                    out.push_str("<a href=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(url));
                    out.push_str("\">");
                    out.push_str(&html_escape::encode_text(label));
                    out.push_str("</a>");
                }
            }
        }
        out
    }

    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        for span in &self.spans {
            match span {
                Span::Text(t) | Span::Bold(t) => out.push_str(t),
                Span::Link { label, url } => {
                    out.push_str(label);
                    out.push_str(": ");
                    out.push_str(url);
                }
            }
        }
        out
    }

    pub fn render(&self, markup: Markup) -> String {
        match markup {
            Markup::Html => self.to_html(),
            Markup::Plain => self.to_plain(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// When set, candle analyses go out as a photo with this image.
    pub chart_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub body: Rich,
    pub photo: Option<String>,
    pub disable_preview: bool,
}

impl Rendered {
    fn text(body: Rich) -> Self {
        Self {
            body,
            photo: None,
            disable_preview: true,
        }
    }

    /// Asset messages never carry rich markup: a photo gets a plain caption.
    pub fn into_message(self) -> OutgoingMessage {
        match self.photo {
            Some(url) => OutgoingMessage::Photo {
                url,
                caption: self.body.to_plain().chars().take(CAPTION_LIMIT).collect(),
            },
            None => OutgoingMessage::Text {
                text: self.body.to_html(),
                markup: Markup::Html,
                disable_preview: self.disable_preview,
            },
        }
    }
}

/// "ETHUSDT" -> "ETH/USDT"
pub fn pair_label(symbol: &str) -> String {
    for quote in ["USDT", "USDC", "BUSD", "USD", "BTC"] {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return format!("{base}/{quote}");
            }
        }
    }
    symbol.to_string()
}

/// 2_100_000 -> "$2.1M"
pub fn compact_usd(v: f64) -> String {
    let a = v.abs();
    let (scaled, unit) = if a >= 1e9 {
        (v / 1e9, "B")
    } else if a >= 1e6 {
        (v / 1e6, "M")
    } else if a >= 1e3 {
        (v / 1e3, "K")
    } else {
        return format!("${v:.0}");
    };
    let s = format!("{scaled:.1}");
    let s = s.strip_suffix(".0").unwrap_or(&s);
    format!("${s}{unit}")
}

/// 24500.0 -> "24,500"; keeps up to two decimals when present.
pub fn group_thousands(v: f64) -> String {
    let s = format!("{:.2}", v.abs());
    let (int, frac) = s.split_once('.').unwrap_or((&s, "00"));
    let mut grouped = String::new();
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let frac = frac.trim_end_matches('0');
    let sign = if v < 0.0 { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

/// "ETHUSDT" -> "ETH"
pub fn base_asset(symbol: &str) -> String {
    pair_label(symbol)
        .split('/')
        .next()
        .unwrap_or(symbol)
        .to_string()
}

pub fn render(event: &DomainEvent, opts: &RenderOptions) -> Rendered {
    match event {
        DomainEvent::News(n) => {
            let body = match n.importance {
                crate::analyze::Importance::Elevated => Rich::new()
                    .text("❗️❗️❗️ ")
                    .bold("URGENT NEWS")
                    .text(" ❗️❗️❗️\n\n🔥 ")
                    .bold(n.item.title.clone()),
                crate::analyze::Importance::Normal => {
                    Rich::new().text("📰 ").bold(n.item.title.clone())
                }
            };
            Rendered::text(
                body.text(format!("\n📍 Source: {}\n", n.item.source))
                    .link("Read more", n.item.link.clone()),
            )
        }
        DomainEvent::Candle(c) => {
            let sign = match c.direction {
                Direction::Up => "+",
                Direction::Down => "-",
            };
            let icon = match c.narrative {
                Narrative::StrongBullish | Narrative::Bullish => "🟢",
                Narrative::StrongBearish | Narrative::Bearish => "🔴",
            };
            let body = Rich::new()
                .text("📊 ")
                .bold(format!(
                    "{} candle analysis {}",
                    c.timeframe.to_uppercase(),
                    pair_label(&c.symbol)
                ))
                .text("\n\n▫️ ")
                .bold("Close:")
                .text(format!(" ${:.2} ({sign}{:.2}%)\n▫️ ", c.candle.close, c.body_pct))
                .bold("Key levels:")
                .text(format!(
                    "\nSupport: ${:.2} | Resistance: ${:.2}\n\n{icon} {}",
                    c.support,
                    c.resistance,
                    c.narrative.headline()
                ));
            Rendered {
                body,
                photo: opts.chart_image_url.clone(),
                disable_preview: true,
            }
        }
        DomainEvent::Altseason(a) => match a.value {
            Altseason::Available {
                btc_dominance,
                score,
                band,
            } => Rendered::text(
                Rich::new()
                    .text("🌐 ")
                    .bold(format!("Altseason index: {score:.1}/100"))
                    .text(format!(
                        "\n▫️ BTC dominance: {btc_dominance:.1}%\n\n{}",
                        band.narrative()
                    )),
            ),
            Altseason::Unavailable => {
                Rendered::text(Rich::new().text("🌐 Altseason index: data unavailable"))
            }
        },
        DomainEvent::PriceAlert(p) => {
            let (icon, sign) = if p.change_pct >= 0.0 {
                ("🚀", "+")
            } else {
                ("🔻", "")
            };
            let asset = base_asset(&p.symbol);
            Rendered::text(
                Rich::new()
                    .text(format!("{icon} "))
                    .bold(format!(
                        "{} moved {sign}{}%",
                        pair_label(&p.symbol),
                        p.change_display()
                    ))
                    .text(format!(
                        "\n▫️ Price: ${:.2} (was ${:.2})\n\n#{asset} #PriceAlert",
                        p.price, p.previous
                    )),
            )
        }
        DomainEvent::Liquidation(l) => {
            let side = match l.side {
                Side::Long => "LONG",
                Side::Short => "SHORT",
            };
            let mut body = Rich::new()
                .text("📉 ")
                .bold(format!("LARGE {} LIQUIDATION!", l.symbol))
                .text("\n\n");
            if let Some(ex) = &l.exchange {
                body = body.text("▫️ Exchange: ").bold(ex.clone()).text("\n");
            }
            body = body
                .text("▫️ Side: ")
                .bold(side)
                .text(" ▫️ Amount: ")
                .bold(compact_usd(l.amount_usd))
                .text("\n");
            if let Some(price) = l.price {
                body = body.text(format!("▫️ Price: ${price:.2}\n"));
            }
            body = body.text(format!(
                "▫️ Time: {} UTC\n\n#{} #Liquidation",
                l.post.posted_at.format("%H:%M"),
                l.symbol
            ));
            Rendered::text(body)
        }
        DomainEvent::Whale(w) => {
            let mut body = Rich::new()
                .text("🐋 ")
                .bold("WHALE ALERT!")
                .text(" 🚨\n\n▫️ Amount: ")
                .bold(format!("{} {}", group_thousands(w.amount), w.symbol));
            if let Some(usd) = w.amount_usd {
                body = body.text(format!(" ({})", compact_usd(usd)));
            }
            body = body.text(format!("\n▫️ Action: {}\n", w.action));
            if let Some(from) = &w.from {
                body = body.text(format!("▫️ From: {from}\n"));
            }
            if let Some(to) = &w.to {
                body = body.text(format!("▫️ To: {to}\n"));
            }
            if let Some(link) = &w.tx_link {
                body = body.text("▫️ Transaction: ").link("Details", link.clone()).text("\n");
            }
            Rendered::text(body.text(format!("\n#{} #WhaleAlert", w.symbol)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escapes_text_and_attributes() {
        let r = Rich::new()
            .bold("A & B <c>")
            .text(" ")
            .link("go", "https://x/?a=1&b=\"2\"");
        assert_eq!(
            r.to_html(),
            "<b>A &amp; B &lt;c&gt;</b> <a href=\"https://x/?a=1&amp;b=&quot;2&quot;\">go</a>"
        );
    }

    #[test]
    fn plain_has_no_tags() {
        let r = Rich::new().bold("Title").text("\n").link("Read", "https://x/1");
        assert_eq!(r.to_plain(), "Title\nRead: https://x/1");
    }

    #[test]
    fn photo_caption_is_plain() {
        let rendered = Rendered {
            body: Rich::new().bold("Chart"),
            photo: Some("https://img/1.png".into()),
            disable_preview: true,
        };
        match rendered.into_message() {
            OutgoingMessage::Photo { caption, url } => {
                assert_eq!(caption, "Chart");
                assert_eq!(url, "https://img/1.png");
            }
            other => panic!("expected photo, got {other:?}"),
        }
    }

    #[test]
    fn number_helpers() {
        assert_eq!(compact_usd(2_100_000.0), "$2.1M");
        assert_eq!(compact_usd(250_300.0), "$250.3K");
        assert_eq!(compact_usd(92_400_123.0), "$92.4M");
        assert_eq!(compact_usd(3_000_000.0), "$3M");
        assert_eq!(compact_usd(950.0), "$950");
        assert_eq!(group_thousands(24_500.0), "24,500");
        assert_eq!(group_thousands(1_234_567.5), "1,234,567.5");
        assert_eq!(group_thousands(999.0), "999");
        assert_eq!(pair_label("ETHUSDT"), "ETH/USDT");
        assert_eq!(pair_label("XYZ"), "XYZ");
    }
}
