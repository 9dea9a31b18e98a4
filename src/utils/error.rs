//! Error types and handling
//!
//! Upstream failures share one taxonomy across both adapters; webhook
//! failures are converted to a consistent JSON response format.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Failures talking to Alertmanager or the IRM API
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("upstream unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    /// Non-2xx response; body kept for the log
    #[error("upstream rejected request with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    /// Body was not the JSON we expected
    #[error("failed to decode upstream response: {0}")]
    Decode(#[source] serde_json::Error),

    /// In-flight call aborted by shutdown
    #[error("operation cancelled")]
    Cancelled,
}

impl UpstreamError {
    /// Classify a reqwest error. Decode failures are handled separately on
    /// the response body so everything arriving here is transport-level.
    pub fn from_transport(err: reqwest::Error) -> Self {
        UpstreamError::Unavailable(err)
    }
}

/// Errors returned to webhook callers
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            WebhookError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            WebhookError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            WebhookError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error"),
            WebhookError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            error!(error = %self, error_type = error_type, "Webhook request error");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, WebhookError::Unauthorized) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Basic realm=\"Restricted\""),
            );
        }
        response
    }
}
