// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use horizon_kernel::config::TUNNEL_ROUTE;
use horizon_kernel::OpenTunnel;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use crate::errors::ApiError;
use crate::horizon::{spawn_singularity_stream, EventHorizon};

pub type SharedHorizon = Arc<EventHorizon>;

pub fn build_router(horizon: SharedHorizon) -> Router {
    Router::new()
        .route(TUNNEL_ROUTE, post(open_tunnel))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(horizon)
}

async fn open_tunnel(
    State(horizon): State<SharedHorizon>,
    Json(handshake): Json<OpenTunnel>,
) -> Result<Response, ApiError> {
    if handshake.events.is_empty() {
        return Err(ApiError::InvalidInput("Tunnel subscribes to no events".to_string()));
    }

    // Catch up from the handshake offset, then stay live
    let collapsed = horizon.collapse_into(&handshake)?;
    let lines = spawn_singularity_stream(collapsed);

    let body = Body::from_stream(ReceiverStream::new(lines));
    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response())
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
