//! Manual reconciliation trigger

use axum::{extract::State, http::StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::AppState;

/// Run a reconciliation cycle on demand
pub async fn reconcile(
    State(state): State<AppState>,
) -> Result<&'static str, (StatusCode, String)> {
    let Some(reconciler) = &state.reconciler else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Reconciliation disabled: IRM is not configured\n".to_string(),
        ));
    };

    info!("Manual reconciliation triggered");

    match reconciler.run_cycle(&CancellationToken::new()).await {
        Ok(()) => Ok("Reconciliation completed successfully\n"),
        Err(err) => {
            error!("Manual reconciliation failed: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Reconciliation failed: {}\n", err),
            ))
        }
    }
}
