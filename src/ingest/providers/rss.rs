use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::http::{build_client, get_text, DEFAULT_TIMEOUT};
use crate::ingest::normalize_text;
use crate::ingest::types::{FetchError, FetchResult, NewsItem, NewsSource};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0)
}

/// RSS 2.0 news feed, tagged with a display name ("CoinDesk", "Cointelegraph", ...).
pub struct RssFeedProvider {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
        timeout: Duration,
    },
}

impl RssFeedProvider {
    pub fn from_fixture(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::from_url_with_timeout(name, url, DEFAULT_TIMEOUT)
    }

    pub fn from_url_with_timeout(
        name: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client: build_client(timeout),
                timeout,
            },
        }
    }

    /// Parse a feed document. Items without a title or link are skipped.
    pub fn parse_items(&self, xml: &str) -> FetchResult<Vec<NewsItem>> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss = from_str(&xml_clean).map_err(FetchError::malformed)?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            // some feeds only carry a permalink guid
            let link = it
                .link
                .or(it.guid)
                .map(|l| l.trim().to_string())
                .unwrap_or_default();
            if title.is_empty() || link.is_empty() {
                tracing::debug!(source = %self.name, "skipping feed item without title/link");
                continue;
            }
            out.push(NewsItem {
                source: self.name.clone(),
                title,
                link,
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl NewsSource for RssFeedProvider {
    async fn fetch_latest(&self) -> FetchResult<Vec<NewsItem>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items(s),
            Mode::Http {
                url,
                client,
                timeout,
            } => {
                let body = get_text(client, url, *timeout).await?;
                self.parse_items(&body)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// quick-xml only knows the XML entities; feeds routinely leak HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
