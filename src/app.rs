// src/app.rs
//! Job registry: the static set of pipelines the bot runs, built from settings.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::analyze::{LiquidationParser, NewsClassifier, PriceMonitor, WhaleParser};
use crate::config::Settings;
use crate::dedup::DedupCache;
use crate::ingest::providers::rss::RssFeedProvider;
use crate::ingest::types::{ChannelSource, DominanceSource, MarketSource, NewsSource};
use crate::jobs::{
    AltseasonJob, CacheSweepJob, CandleJob, ChannelJob, NewsJob, PriceJob, JOB_LIQUIDATION,
    JOB_WHALE,
};
use crate::notify::Publisher;
use crate::scheduler::{Scheduler, Trigger};

/// External collaborators the jobs read from.
pub struct Sources {
    pub news: Vec<Box<dyn NewsSource>>,
    pub market: Arc<dyn MarketSource>,
    pub dominance: Arc<dyn DominanceSource>,
    pub channels: Arc<dyn ChannelSource>,
}

impl Sources {
    pub fn rss_feeds(settings: &Settings) -> Vec<Box<dyn NewsSource>> {
        settings
            .news
            .sources
            .iter()
            .map(|f| {
                Box::new(RssFeedProvider::from_url_with_timeout(
                    f.name.clone(),
                    f.url.clone(),
                    settings.http_timeout(),
                )) as Box<dyn NewsSource>
            })
            .collect()
    }
}

fn every(secs: u64) -> Trigger {
    Trigger::Interval(Duration::from_secs(secs))
}

pub fn build_scheduler(
    settings: &Settings,
    sources: Sources,
    publisher: Arc<Publisher>,
    cache: Arc<DedupCache>,
) -> Result<Scheduler> {
    let timeout = settings.http_timeout();
    let symbol = settings.symbol.as_str();
    // channel parsers match on the base asset ("ETH")
    let asset = crate::notify::format::base_asset(symbol);

    let news = NewsJob::new(
        sources.news,
        NewsClassifier::new(&settings.tracked_entity),
        publisher.clone(),
    )
    .with_timeout(timeout)
    .with_per_source_cap(settings.news.per_source_cap)
    .with_pacing(Duration::from_secs(settings.news.pacing_secs));

    let candle = CandleJob::new(
        sources.market.clone(),
        symbol,
        settings.candle.timeframe.clone(),
        publisher.clone(),
    )
    .with_timeout(timeout);

    let altseason = AltseasonJob::new(sources.dominance, publisher.clone()).with_timeout(timeout);

    let price = PriceJob::new(
        sources.market,
        symbol,
        PriceMonitor::new(settings.price.threshold_pct),
        publisher.clone(),
    )
    .with_timeout(timeout);

    let liq = &settings.liquidation;
    let liquidation = ChannelJob::new(
        JOB_LIQUIDATION,
        sources.channels.clone(),
        liq.channel.clone(),
        LiquidationParser::new(&asset, liq.min_usd),
        publisher.clone(),
    )
    .with_limit(liq.limit)
    .with_pacing(Duration::from_secs(liq.pacing_secs))
    .with_timeout(timeout);

    let wh = &settings.whale;
    let whale = ChannelJob::new(
        JOB_WHALE,
        sources.channels,
        wh.channel.clone(),
        WhaleParser::new(&asset, wh.min_usd),
        publisher,
    )
    .with_limit(wh.limit)
    .with_pacing(Duration::from_secs(wh.pacing_secs))
    .with_timeout(timeout);

    Ok(Scheduler::new()
        .register(Arc::new(news), every(settings.news.interval_secs))
        .register(
            Arc::new(candle),
            settings.candle.schedule.to_trigger("candle.schedule")?,
        )
        .register(
            Arc::new(altseason),
            settings.altseason.schedule.to_trigger("altseason.schedule")?,
        )
        .register(Arc::new(price), every(settings.price.interval_secs))
        .register(Arc::new(liquidation), every(liq.interval_secs))
        .register(Arc::new(whale), every(wh.interval_secs))
        .register(
            Arc::new(CacheSweepJob::new(cache)),
            every(settings.dedup.sweep_interval_secs),
        ))
}
