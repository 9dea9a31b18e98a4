//! HTTP endpoints and routing

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

mod health;
mod metrics;
mod reconcile;
mod webhook;

pub use health::{healthz, readyz};

/// Build the full router for the service.
///
/// The webhook endpoint is only mounted when the IRM integration (and with
/// it the webhook credentials) is configured.
pub fn routes(state: &AppState) -> Router<AppState> {
    let mut router = Router::new()
        .route("/metrics", get(metrics::metrics))
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/reconcile", post(reconcile::reconcile));

    if state.webhook.is_some() {
        router = router.route("/webhook", post(webhook::webhook));
    }

    router
}
