// src/config/mod.rs
//! Process configuration.
//!
//! Secrets come from the environment (a `.env` file is honoured in dev) and are
//! required: a missing one aborts startup. Tunables come from a TOML file:
//! 1) $BOT_CONFIG_PATH
//! 2) config/bot.toml
//! 3) built-in defaults

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::{CalendarSpec, Trigger};

pub const ENV_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_ADMIN_CHAT: &str = "TELEGRAM_ADMIN_CHAT_ID";
pub const ENV_CHANNEL: &str = "TELEGRAM_CHANNEL_ID";
pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("{0} points to non-existent path {1}")]
    MissingFile(&'static str, PathBuf),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Credentials and destination ids.
#[derive(Clone)]
pub struct Secrets {
    pub bot_token: String,
    pub admin_chat_id: String,
    pub channel_id: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("bot_token", &"<redacted>")
            .field("admin_chat_id", &self.admin_chat_id)
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

fn required_env(key: &'static str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingEnv(key)),
    }
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: required_env(ENV_TOKEN)?,
            admin_chat_id: required_env(ENV_ADMIN_CHAT)?,
            channel_id: required_env(ENV_CHANNEL)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// Calendar trigger as written in the file; weekdays by name ("Mon", "friday").
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CalendarConfig {
    #[serde(default)]
    pub hours: Vec<u32>,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub weekdays: Vec<String>,
}

impl CalendarConfig {
    pub fn to_trigger(&self, key: &str) -> Result<Trigger, ConfigError> {
        let weekdays = self
            .weekdays
            .iter()
            .map(|d| {
                d.trim()
                    .parse::<Weekday>()
                    .map_err(|_| invalid(key, format!("unknown weekday {d:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        CalendarSpec::new(self.hours.clone(), self.minute, weekdays)
            .map(Trigger::Calendar)
            .map_err(|e| invalid(key, e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub sources: Vec<FeedConfig>,
    pub per_source_cap: usize,
    pub interval_secs: u64,
    pub pacing_secs: u64,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            sources: vec![
                FeedConfig {
                    name: "CoinDesk".into(),
                    url: "https://rss.app/feeds/TrK9U72kbG7ExS7s.xml".into(),
                },
                FeedConfig {
                    name: "Cointelegraph".into(),
                    url: "https://rss.app/feeds/IxaMDb7bW79A0vUj.xml".into(),
                },
            ],
            per_source_cap: 5,
            interval_secs: 300,
            pacing_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CandleSettings {
    pub timeframe: String,
    pub schedule: CalendarConfig,
    /// Sent as a photo with a plain caption when set.
    pub chart_image_url: Option<String>,
}

impl Default for CandleSettings {
    fn default() -> Self {
        Self {
            timeframe: "4h".into(),
            // a minute after each 4h bar closes
            schedule: CalendarConfig {
                hours: vec![0, 4, 8, 12, 16, 20],
                minute: 1,
                weekdays: Vec::new(),
            },
            chart_image_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AltseasonSettings {
    pub schedule: CalendarConfig,
}

impl Default for AltseasonSettings {
    fn default() -> Self {
        Self {
            schedule: CalendarConfig {
                hours: vec![9],
                minute: 0,
                weekdays: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceSettings {
    pub interval_secs: u64,
    pub threshold_pct: f64,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            threshold_pct: 3.0,
        }
    }
}

/// A channel-reading job (liquidations, whale transfers).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelJobSettings {
    pub channel: String,
    pub interval_secs: u64,
    pub min_usd: f64,
    pub limit: usize,
    pub pacing_secs: u64,
}

impl ChannelJobSettings {
    fn with_channel(channel: &str, min_usd: f64) -> Self {
        Self {
            channel: channel.into(),
            interval_secs: 300,
            min_usd,
            limit: 20,
            pacing_secs: 2,
        }
    }
}

impl Default for ChannelJobSettings {
    fn default() -> Self {
        Self::with_channel("", 1_000_000.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub ttl_secs: u64,
    pub capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            capacity: 4096,
            sweep_interval_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// User or chat ids allowed to issue commands. The admin chat is always allowed.
    pub allowed: Vec<String>,
    pub poll_timeout_secs: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            allowed: Vec::new(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub symbol: String,
    pub tracked_entity: String,
    /// Log messages instead of sending them.
    pub dry_run: bool,
    pub http_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
    /// Ops HTTP surface; empty disables it.
    pub ops_bind: String,
    pub news: NewsSettings,
    pub candle: CandleSettings,
    pub altseason: AltseasonSettings,
    pub price: PriceSettings,
    pub liquidation: ChannelJobSettings,
    pub whale: ChannelJobSettings,
    pub dedup: DedupSettings,
    pub commands: CommandSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbol: "ETHUSDT".into(),
            tracked_entity: "Ethereum".into(),
            dry_run: false,
            http_timeout_secs: 10,
            shutdown_grace_secs: 10,
            ops_bind: "0.0.0.0:8080".into(),
            news: NewsSettings::default(),
            candle: CandleSettings::default(),
            altseason: AltseasonSettings::default(),
            price: PriceSettings::default(),
            liquidation: ChannelJobSettings::with_channel("@BinanceLiquidations", 1_000_000.0),
            whale: ChannelJobSettings::with_channel("@whale_alert_io", 1_000_000.0),
            dedup: DedupSettings::default(),
            commands: CommandSettings::default(),
        }
    }
}

fn positive(key: &str, v: u64) -> Result<(), ConfigError> {
    if v == 0 {
        return Err(invalid(key, "must be greater than zero"));
    }
    Ok(())
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(s).context("parsing bot settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// $BOT_CONFIG_PATH, then config/bot.toml, then defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingFile(ENV_CONFIG_PATH, pb).into());
            }
            return Self::load_from(&pb);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol", "must not be empty"));
        }
        positive("http_timeout_secs", self.http_timeout_secs)?;
        positive("news.interval_secs", self.news.interval_secs)?;
        positive("price.interval_secs", self.price.interval_secs)?;
        positive("liquidation.interval_secs", self.liquidation.interval_secs)?;
        positive("whale.interval_secs", self.whale.interval_secs)?;
        positive("dedup.ttl_secs", self.dedup.ttl_secs)?;
        positive("dedup.sweep_interval_secs", self.dedup.sweep_interval_secs)?;
        if self.dedup.capacity == 0 {
            return Err(invalid("dedup.capacity", "must be greater than zero"));
        }
        if !(self.price.threshold_pct.is_finite() && self.price.threshold_pct > 0.0) {
            return Err(invalid("price.threshold_pct", "must be a positive number"));
        }
        for f in &self.news.sources {
            if f.name.trim().is_empty() || !f.url.starts_with("http") {
                return Err(invalid("news.sources", format!("bad feed entry {f:?}")));
            }
        }
        self.candle.schedule.to_trigger("candle.schedule")?;
        self.altseason.schedule.to_trigger("altseason.schedule")?;
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Everything the process needs to start.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub secrets: Secrets,
    pub settings: Settings,
}

impl BotConfig {
    /// Fatal on any error: called before the scheduler starts.
    pub fn load() -> Result<Self> {
        let secrets = Secrets::from_env()?;
        let settings = Settings::load_default()?;
        Ok(Self { secrets, settings })
    }
}
