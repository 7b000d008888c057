// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const CONNECTS_TOTAL: &str = "horizon_tunnel_connects_total";
pub const BATCHES_COMMITTED_TOTAL: &str = "horizon_tunnel_batches_committed_total";
pub const BATCHES_DROPPED_TOTAL: &str = "horizon_tunnel_batches_dropped_total";
pub const BATCHES_SKIPPED_TOTAL: &str = "horizon_tunnel_batches_skipped_total";
pub const PASSED_THROUGH_TOTAL: &str = "horizon_passed_through_total";
pub const NOT_LOCAL_TOTAL: &str = "horizon_not_local_total";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    // 1. Tracing
    let init = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "horizon_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if init.is_err() {
        tracing::warn!("Tracing subscriber already installed");
    }

    // 2. Prometheus
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("Failed to install Prometheus recorder: {}", e),
    }

    metrics::describe_counter!(CONNECTS_TOTAL, "Handshakes sent by tunnels, including reconnects");
    metrics::describe_counter!(BATCHES_COMMITTED_TOTAL, "Remote batches committed to the local store");
    metrics::describe_counter!(BATCHES_DROPPED_TOTAL, "Remote batches that failed and were dropped");
    metrics::describe_counter!(PASSED_THROUGH_TOTAL, "Committed streams sent through a singularity");

    metrics::gauge!("horizon_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
