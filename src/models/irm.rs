//! IRM API wire types
//!
//! The IRM API is loose about absent values: timestamp fields arrive as
//! `null`, an empty string, or not at all, and user references may be null.
//! Everything optional decodes to `None`; a timestamp that looks like
//! RFC-3339 but fails to parse is logged and treated as absent, since these
//! values only ever become metric label text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Paged envelope of GET /api/v1/alert_groups
#[derive(Debug, Clone, Deserialize)]
pub struct AlertGroupPage {
    #[serde(default)]
    pub results: Vec<AlertGroup>,
}

/// A group of related alerts in the IRM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertGroup {
    pub id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub acknowledged_by: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub resolved_by: Option<String>,
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "nullable_timestamp")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_alert: LastAlert,
}

impl AlertGroup {
    pub fn is_resolved(&self) -> bool {
        self.state == "resolved"
    }

    /// Fingerprints of the member alerts, skipping empties
    pub fn fingerprints(&self) -> impl Iterator<Item = &str> {
        self.last_alert
            .payload
            .alerts
            .iter()
            .map(|a| a.fingerprint.as_str())
            .filter(|f| !f.is_empty())
    }
}

/// The most recent alert delivered to the group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LastAlert {
    #[serde(default)]
    pub payload: AlertPayload,
}

/// Alertmanager-shaped payload carried by the last alert
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertPayload {
    #[serde(default)]
    pub alerts: Vec<GroupAlert>,
}

/// A member alert inside a group payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupAlert {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub labels: std::collections::HashMap<String, String>,
}

/// An IRM user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// Decode null / "" / missing to None, anything else to Some
fn nullable_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()))
}

/// Decode null / "" / missing to None; parseable RFC-3339 to the instant;
/// an unparseable non-empty string to None with a warning
fn nullable_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).and_then(|s| {
        match DateTime::parse_from_rfc3339(&s) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(err) => {
                warn!(value = %s, error = %err, "Discarding unparseable upstream timestamp");
                None
            }
        }
    }))
}
