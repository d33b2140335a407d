//! # Prometheus Metrics
//!
//! Exposes operational metrics for the agent. Scraped by Prometheus at the
//! `/metrics` endpoint on the API port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the agent.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct AgentMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of successful wallet connections.
    pub sessions_connected_total: IntCounter,
    /// Total number of reconnect attempts scheduled.
    pub reconnect_attempts_total: IntCounter,
    /// Total number of transactions submitted to the wallet.
    pub transactions_submitted_total: IntCounter,
    /// Total number of transactions confirmed on-chain.
    pub transactions_confirmed_total: IntCounter,
    /// Total number of transactions that went terminal without confirming.
    pub transactions_failed_total: IntCounter,
    /// Total number of payment links encoded.
    pub links_encoded_total: IntCounter,
    /// Total number of payment-link decode requests served.
    pub links_decoded_total: IntCounter,
    /// Whether the session is currently connected (1) or not (0).
    pub session_connected: IntGauge,
    /// Histogram of provider latency probes in seconds.
    pub provider_latency_seconds: Histogram,
}

impl AgentMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("paylink".into()), None)
            .expect("failed to create prometheus registry");

        let sessions_connected_total = IntCounter::new(
            "sessions_connected_total",
            "Total number of successful wallet connections",
        )
        .expect("metric creation");
        registry
            .register(Box::new(sessions_connected_total.clone()))
            .expect("metric registration");

        let reconnect_attempts_total = IntCounter::new(
            "reconnect_attempts_total",
            "Total number of auto-reconnect attempts scheduled",
        )
        .expect("metric creation");
        registry
            .register(Box::new(reconnect_attempts_total.clone()))
            .expect("metric registration");

        let transactions_submitted_total = IntCounter::new(
            "transactions_submitted_total",
            "Total number of transactions submitted to the wallet",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_submitted_total.clone()))
            .expect("metric registration");

        let transactions_confirmed_total = IntCounter::new(
            "transactions_confirmed_total",
            "Total number of transactions confirmed on-chain",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_confirmed_total.clone()))
            .expect("metric registration");

        let transactions_failed_total = IntCounter::new(
            "transactions_failed_total",
            "Total number of transactions that went terminal without confirming",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_failed_total.clone()))
            .expect("metric registration");

        let links_encoded_total = IntCounter::new(
            "links_encoded_total",
            "Total number of payment links encoded",
        )
        .expect("metric creation");
        registry
            .register(Box::new(links_encoded_total.clone()))
            .expect("metric registration");

        let links_decoded_total = IntCounter::new(
            "links_decoded_total",
            "Total number of payment-link decode requests served",
        )
        .expect("metric creation");
        registry
            .register(Box::new(links_decoded_total.clone()))
            .expect("metric registration");

        let session_connected = IntGauge::new(
            "session_connected",
            "Whether the wallet session is currently connected (1) or not (0)",
        )
        .expect("metric creation");
        registry
            .register(Box::new(session_connected.clone()))
            .expect("metric registration");

        let provider_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "provider_latency_seconds",
                "Round-trip latency of provider probes in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(provider_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            sessions_connected_total,
            reconnect_attempts_total,
            transactions_submitted_total,
            transactions_confirmed_total,
            transactions_failed_total,
            links_encoded_total,
            links_decoded_total,
            session_connected,
            provider_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers and the event pump.
pub type SharedMetrics = Arc<AgentMetrics>;
