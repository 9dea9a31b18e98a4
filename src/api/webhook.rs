//! IRM silence webhook handler
//!
//! Translates IRM silence events into either a compensating unsilence call
//! back to the IRM (user not allow-listed) or freshly created Alertmanager
//! silences covering every alert in the group (user allow-listed).

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::config::WebhookConfig;
use crate::models::{EventAlert, Matcher, PostableSilence, WebhookEvent};
use crate::utils::WebhookError;
use crate::AppState;

/// Handle a webhook event from the IRM
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, WebhookError> {
    let config = state
        .webhook
        .as_ref()
        .ok_or_else(|| WebhookError::Internal("webhook not configured".to_string()))?;

    check_basic_auth(&headers, config)?;

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|err| WebhookError::BadRequest(format!("invalid payload: {}", err)))?;

    if event.event.event_type.is_empty() {
        info!("Ignoring webhook event: event.type is empty");
        return Ok(Json(json!({"status": "ignored", "reason": "no event type"})));
    }

    if event.event.event_type != "silence" {
        info!(
            "Ignoring webhook event: type is {} (not silence)",
            event.event.event_type
        );
        return Ok(Json(json!({"status": "ignored", "reason": "not a silence event"})));
    }

    let group_id = &event.alert_group.id;
    info!(
        "Processing silence event for alert group {} by user {}",
        group_id, event.user.email
    );

    if !config.email_allowlist.contains(&event.user.email) {
        // The user may not impose silences: undo the one they just made.
        info!(
            "User {} not in allowlist, unsilencing alert group {}",
            event.user.email, group_id
        );
        let irm = state
            .irm
            .as_ref()
            .ok_or_else(|| WebhookError::Internal("IRM not configured".to_string()))?;
        irm.unsilence_alert_group(group_id).await?;
        return Ok(Json(json!({"status": "unsilenced", "alert_group_id": group_id})));
    }

    if event.event.until.is_empty() {
        info!(
            "User {} in allowlist but no until time specified, ignoring",
            event.user.email
        );
        return Ok(Json(json!({"status": "ignored", "reason": "no until time"})));
    }

    let until = DateTime::parse_from_rfc3339(&event.event.until)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            WebhookError::BadRequest(format!("invalid until time {}: {}", event.event.until, err))
        })?;

    let mut silences_created = 0;
    for alert in &event.alert_group.last_alert.payload.alerts {
        match create_silence_for_alert(&state, alert, &event, until).await {
            Ok(silence_id) => {
                info!("Created silence {} for alert {}", silence_id, alert.fingerprint);
                silences_created += 1;
            }
            Err(err) => {
                warn!(
                    "Failed to create silence for alert {}: {}",
                    alert.fingerprint, err
                );
            }
        }
    }

    if silences_created == 0 {
        return Err(WebhookError::Internal(
            "failed to create any silences".to_string(),
        ));
    }

    info!(
        "Created {} silences in Alertmanager for alert group {}",
        silences_created, group_id
    );
    Ok(Json(json!({
        "status": "silenced",
        "alert_group_id": group_id,
        "silences_created": silences_created.to_string(),
    })))
}

/// Create an Alertmanager silence matching every label of one alert
async fn create_silence_for_alert(
    state: &AppState,
    alert: &EventAlert,
    event: &WebhookEvent,
    until: DateTime<Utc>,
) -> Result<String, WebhookError> {
    let mut matchers: Vec<Matcher> = alert
        .labels
        .iter()
        .map(|(name, value)| Matcher::equal(name, value))
        .collect();
    matchers.sort_by(|a, b| a.name.cmp(&b.name));

    let comment = format!(
        "Automated silence for IRM Alert Group: {} - {} (ID: {})",
        event.alert_group.title, event.alert_group.permalinks.web, event.alert_group.id
    );

    let spec = PostableSilence {
        matchers,
        starts_at: Utc::now(),
        ends_at: until,
        created_by: event.user.email.clone(),
        comment,
    };

    info!(
        "Creating silence for alert {} (fingerprint: {}) until {}",
        alert.labels.get("alertname").map(String::as_str).unwrap_or(""),
        alert.fingerprint,
        until.to_rfc3339()
    );

    Ok(state.am.create_silence(&spec).await?)
}

/// Require exactly the configured basic credentials
fn check_basic_auth(headers: &HeaderMap, config: &WebhookConfig) -> Result<(), WebhookError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::Unauthorized)?;

    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(WebhookError::Unauthorized)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(WebhookError::Unauthorized)?;

    let (username, password) = decoded.split_once(':').ok_or(WebhookError::Unauthorized)?;

    if username != config.username || password != config.password {
        return Err(WebhookError::Unauthorized);
    }

    Ok(())
}
