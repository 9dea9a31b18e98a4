//! Inbound IRM webhook payload
//!
//! Every field is default-tolerant: the handler's pre-checks, not serde,
//! decide how an incomplete event is answered.

use serde::Deserialize;
use std::collections::HashMap;

/// An event delivered to /webhook by the IRM
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: EventInfo,
    #[serde(default)]
    pub user: UserInfo,
    #[serde(default)]
    pub alert_group: EventAlertGroup,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventInfo {
    #[serde(default, rename = "type")]
    pub event_type: String,
    /// RFC-3339 end of the requested silence window, or empty
    #[serde(default)]
    pub until: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventAlertGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalinks: Permalinks,
    #[serde(default)]
    pub last_alert: EventLastAlert,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Permalinks {
    #[serde(default)]
    pub web: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventLastAlert {
    #[serde(default)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub alerts: Vec<EventAlert>,
}

/// A member alert inside the webhook payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventAlert {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}
