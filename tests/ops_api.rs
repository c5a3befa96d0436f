// tests/ops_api.rs
//
// Ops router exercised without sockets via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /status (JSON snapshot: jobs, next runs, price)
// - GET /metrics

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value as Json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt as _; // for `oneshot`

use eth_tracker_bot::analyze::PriceObservation;
use eth_tracker_bot::api;
use eth_tracker_bot::dedup::DedupCache;
use eth_tracker_bot::metrics::Metrics;
use eth_tracker_bot::scheduler::{
    CalendarSpec, Job, JobContext, RunningScheduler, Scheduler, Trigger,
};
use eth_tracker_bot::status::StatusSource;

const BODY_LIMIT: usize = 1024 * 1024;

struct Noop(&'static str);

#[async_trait]
impl Job for Noop {
    fn name(&self) -> &str {
        self.0
    }
    async fn run(&self, _ctx: &JobContext) -> Result<()> {
        Ok(())
    }
}

fn start() -> (RunningScheduler, StatusSource) {
    let scheduler = Scheduler::new();
    scheduler.price_cell().swap(PriceObservation {
        price: 3785.42,
        observed_at: Utc::now(),
    });
    let daily = CalendarSpec::daily(9, 0).expect("calendar");
    let running = scheduler
        .register(Arc::new(Noop("liquidation")), Trigger::Calendar(daily.clone()))
        .register(Arc::new(Noop("whale")), Trigger::Calendar(daily))
        .start();
    let cache = Arc::new(DedupCache::default());
    cache.mark("news:https://x/1");
    let status = StatusSource {
        scheduler: running.handle(),
        cache,
        symbol: "ETHUSDT".into(),
        dry_run: true,
        started_at: Utc::now(),
    };
    (running, status)
}

fn router(status: StatusSource) -> Router {
    api::create_router(status, &Metrics::detached())
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, String::from_utf8(bytes).expect("utf8"))
}

#[tokio::test]
async fn health_is_ok() {
    let (running, status) = start();
    let (code, body) = get(router(status), "/health").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body.trim(), "ok");
    running.shutdown(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn status_reports_jobs_price_and_cache() {
    let (running, status) = start();
    // let the job loops publish their next run times
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (code, body) = get(router(status), "/status").await;
    assert_eq!(code, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).expect("json");

    assert_eq!(v["job_count"], 2);
    assert_eq!(v["symbol"], "ETHUSDT");
    assert_eq!(v["dry_run"], true);
    assert_eq!(v["dedup_entries"], 1);
    assert!((v["price"]["price"].as_f64().unwrap() - 3785.42).abs() < 1e-9);

    let jobs = v["jobs"].as_array().expect("jobs array");
    let names: Vec<&str> = jobs.iter().filter_map(|j| j["name"].as_str()).collect();
    assert_eq!(names, ["liquidation", "whale"]);
    for j in jobs {
        assert_eq!(j["trigger"], "at 09:00 UTC");
        assert!(j["next_run"].is_string(), "next run is published: {j}");
    }
    running.shutdown(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let (running, status) = start();
    let (code, _body) = get(router(status), "/metrics").await;
    assert_eq!(code, StatusCode::OK);
    running.shutdown(Duration::from_millis(100)).await;
}
