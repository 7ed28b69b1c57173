//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `tessera` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Prometheus handles are reference-counted internally, so clones share
/// the same underlying series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Batches that committed.
    pub batches_committed_total: IntCounter,
    /// Batches that reverted, labelled by error kind.
    pub batches_rejected_total: IntCounterVec,
    /// Liquidations settled.
    pub liquidations_total: IntCounter,
    /// Open credit accounts.
    pub accounts: IntGauge,
    /// Registered assets.
    pub assets: IntGauge,
    /// Wall time spent executing a batch, in seconds.
    pub batch_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tessera".into()), None)?;

        let batches_committed_total =
            IntCounter::new("batches_committed_total", "Total number of committed batches")?;
        registry.register(Box::new(batches_committed_total.clone()))?;

        let batches_rejected_total = IntCounterVec::new(
            Opts::new(
                "batches_rejected_total",
                "Total number of reverted batches by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(batches_rejected_total.clone()))?;

        let liquidations_total =
            IntCounter::new("liquidations_total", "Total number of settled liquidations")?;
        registry.register(Box::new(liquidations_total.clone()))?;

        let accounts = IntGauge::new("accounts", "Number of open credit accounts")?;
        registry.register(Box::new(accounts.clone()))?;

        let assets = IntGauge::new("assets", "Number of registered assets")?;
        registry.register(Box::new(assets.clone()))?;

        let batch_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "batch_latency_seconds",
                "Batch execution latency in seconds, including the solvency check",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(batch_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            batches_committed_total,
            batches_rejected_total,
            liquidations_total,
            accounts,
            assets,
            batch_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_metrics_carry_prefix() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.batches_committed_total.inc();
        metrics
            .batches_rejected_total
            .with_label_values(&["insolvent"])
            .inc();

        let text = metrics.encode().unwrap();
        assert!(text.contains("tessera_batches_committed_total 1"));
        assert!(text.contains("tessera_batches_rejected_total{kind=\"insolvent\"} 1"));
    }
}
