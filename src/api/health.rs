//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode};

use crate::AppState;

/// Liveness probe: 200 as long as the process serves requests
pub async fn healthz() -> &'static str {
    "OK\n"
}

/// Readiness probe: ready once the reconciliation engine is initialized
pub async fn readyz(State(state): State<AppState>) -> Result<&'static str, (StatusCode, &'static str)> {
    if state.reconciler.is_some() {
        Ok("Ready\n")
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Not ready: reconciler not initialized\n",
        ))
    }
}
