//! Prometheus scrape endpoint

use axum::{extract::State, http::StatusCode};
use tracing::error;

use crate::AppState;

/// Render every registered metric in Prometheus text format
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.exporter.encode().map_err(|err| {
        error!("Failed to encode metrics: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
