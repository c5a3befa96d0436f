//! ETH tracker bot entrypoint.
//! Loads configuration, starts the job scheduler, the Telegram update poller
//! and the ops HTTP server, and shuts all of them down on Ctrl-C.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

use eth_tracker_bot::{
    api,
    app::{self, Sources},
    commands::{AccessList, UpdatePoller},
    config::BotConfig,
    dedup::DedupCache,
    ingest::providers::{
        binance::BinanceMarket, channel::ChannelHistory, coingecko::CoinGeckoGlobal,
    },
    metrics::Metrics,
    notify::{notify_admin, Destination, LogSink, Publisher, RenderOptions, Sink, TelegramApi},
    status::StatusSource,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_logging();

    // Missing credentials are fatal before anything starts.
    let config = match BotConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "configuration error, refusing to start");
            return Err(e);
        }
    };
    let settings = &config.settings;
    let started_at = Utc::now();

    let metrics = Metrics::init(settings.dedup.ttl_secs, settings.dedup.capacity)?;
    let cache = Arc::new(DedupCache::new(
        chrono::Duration::seconds(settings.dedup.ttl_secs as i64),
        settings.dedup.capacity,
    ));

    let api_client = TelegramApi::new(config.secrets.bot_token.clone());
    let sink: Arc<dyn Sink> = if settings.dry_run {
        tracing::warn!("dry-run: messages are logged, not sent");
        Arc::new(LogSink)
    } else {
        Arc::new(api_client.clone())
    };
    let admin = Destination::Admin(config.secrets.admin_chat_id.clone());
    let broadcast = Destination::Broadcast(config.secrets.channel_id.clone());

    let publisher = Arc::new(
        Publisher::new(sink.clone(), cache.clone(), broadcast).with_render_options(RenderOptions {
            chart_image_url: settings.candle.chart_image_url.clone(),
        }),
    );

    let timeout = settings.http_timeout();
    let history = ChannelHistory::default();
    let sources = Sources {
        news: Sources::rss_feeds(settings),
        market: Arc::new(BinanceMarket::with_base_url(
            eth_tracker_bot::ingest::providers::binance::BINANCE_API_URL,
            timeout,
        )),
        dominance: Arc::new(CoinGeckoGlobal::with_base_url(
            eth_tracker_bot::ingest::providers::coingecko::COINGECKO_API_URL,
            timeout,
        )),
        channels: Arc::new(history.clone()),
    };

    let scheduler = app::build_scheduler(settings, sources, publisher, cache.clone())
        .context("building job registry")?;
    let running = scheduler.start();

    let status = StatusSource {
        scheduler: running.handle(),
        cache,
        symbol: settings.symbol.clone(),
        dry_run: settings.dry_run,
        started_at,
    };

    let (stop_tx, stop_rx) = watch::channel(false);

    let poller = UpdatePoller::new(
        api_client,
        sink.clone(),
        history,
        status.clone(),
        AccessList::new(&config.secrets.admin_chat_id, &settings.commands.allowed),
    )
    .with_wait_secs(settings.commands.poll_timeout_secs);
    let poller_task = tokio::spawn(poller.run(stop_rx.clone()));

    let ops_task = if settings.ops_bind.trim().is_empty() {
        None
    } else {
        let listener = tokio::net::TcpListener::bind(&settings.ops_bind)
            .await
            .with_context(|| format!("binding ops server on {}", settings.ops_bind))?;
        tracing::info!(addr = %settings.ops_bind, "ops server listening");
        let router = api::create_router(status.clone(), &metrics);
        let mut stop = stop_rx.clone();
        Some(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.changed().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "ops server failed");
            }
        }))
    };

    notify_admin(
        sink.as_ref(),
        &admin,
        &format!(
            "✅ Bot started: {} jobs registered{}",
            status.scheduler.job_count(),
            if settings.dry_run { " (dry-run)" } else { "" }
        ),
    )
    .await;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");

    // No new invocations first, then release the rest.
    running.shutdown(settings.shutdown_grace()).await;
    let _ = stop_tx.send(true);
    let _ = poller_task.await;
    if let Some(t) = ops_task {
        let _ = t.await;
    }

    notify_admin(sink.as_ref(), &admin, "🛑 Bot stopped").await;
    Ok(())
}
