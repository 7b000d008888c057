// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crate::store::StoreError;
use horizon_persistence::PersistenceError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Required setting {0} is not set")]
    Missing(&'static str),
    #[error("Setting {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("Failed to read event horizons configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse event horizons configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures that stop the node from starting.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Commit history unavailable: {0}")]
    History(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::History(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
