use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the static dedup settings.
    pub fn init(dedup_ttl_secs: u64, dedup_capacity: usize) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;

        describe_gauge!("dedup_cache_size", "Live entries in the dedup cache.");
        gauge!("dedup_cache_ttl_secs").set(dedup_ttl_secs as f64);
        gauge!("dedup_cache_capacity").set(dedup_capacity as f64);

        Ok(Self { handle })
    }

    /// A handle for tests: renders, but is not installed as the global recorder.
    pub fn detached() -> Self {
        Self {
            handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
