// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use horizon_node::config::NodeConfig;
use horizon_node::errors::NodeError;
use horizon_node::horizon::EventHorizon;
use horizon_node::processing::{ChainedProcessors, EventProcessors};
use horizon_node::server::build_router;
use horizon_node::store::InMemoryEventStore;
use horizon_node::supervisor::{shutdown_signal, TunnelSupervisor};
use horizon_node::telemetry::init_telemetry;
use horizon_persistence::{DiskFiles, SequenceGenerator};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    init_telemetry();

    let cfg = NodeConfig::from_env()?;
    tracing::info!("Initializing Horizon Node with config: {:?}", cfg);

    // A missing or corrupt counter store stops startup
    let sequence_numbers = SequenceGenerator::configured(DiskFiles, cfg.sequence_path.clone())?;
    let store = Arc::new(InMemoryEventStore::new(sequence_numbers));

    // Tunnels catch up from what this node committed itself
    let horizon = Arc::new(EventHorizon::with_history(
        cfg.application,
        cfg.bounded_context,
        store.clone(),
    ));

    // Replicated commits are stored, never passed through the horizon again.
    // The binary hosts no read models, so there is nothing else to run.
    let processors: Arc<dyn EventProcessors> = Arc::new(ChainedProcessors::new(Vec::new()));

    let tunnels = TunnelSupervisor::start(&cfg, store, processors);

    let app = build_router(horizon);
    let listener = TcpListener::bind(cfg.bind_addr).await?;
    tracing::info!("Listening on {}", cfg.bind_addr);

    // Tunnel responses never end on their own, so the server is not drained
    tokio::select! {
        served = axum::serve(listener, app).into_future() => served?,
        signal = shutdown_signal() => signal?,
    }

    tracing::info!("Shutting down");
    tunnels.shutdown().await;
    Ok(())
}
