//! Alertmanager API v2 wire types
//!
//! Only the fields the synchronizer reads are modeled; unknown fields are
//! ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An alert as returned by GET /api/v2/alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub fingerprint: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

/// Processing status of an alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStatus {
    pub state: AlertState,
    #[serde(default, rename = "silencedBy")]
    pub silenced_by: Vec<String>,
    #[serde(default, rename = "inhibitedBy")]
    pub inhibited_by: Vec<String>,
}

/// Alertmanager alert states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Active,
    Suppressed,
    Unprocessed,
}

impl Alert {
    /// The value of the `alertname` label, or empty
    pub fn alertname(&self) -> &str {
        self.labels.get("alertname").map(String::as_str).unwrap_or("")
    }

    /// Whether the alert is currently held down by at least one silence
    pub fn is_silenced(&self) -> bool {
        !self.status.silenced_by.is_empty()
    }
}

/// A silence as returned by GET /api/v2/silence/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Silence {
    pub id: String,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(default)]
    pub comment: String,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    pub ends_at: DateTime<Utc>,
}

/// Request body for POST /api/v2/silences
#[derive(Debug, Clone, Serialize)]
pub struct PostableSilence {
    pub matchers: Vec<Matcher>,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    pub ends_at: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    pub comment: String,
}

/// Label matcher inside a silence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matcher {
    pub name: String,
    pub value: String,
    #[serde(rename = "isEqual")]
    pub is_equal: bool,
    #[serde(rename = "isRegex")]
    pub is_regex: bool,
}

impl Matcher {
    /// An exact, non-regex equality matcher
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_equal: true,
            is_regex: false,
        }
    }
}

/// Response body of POST /api/v2/silences
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSilence {
    #[serde(rename = "silenceID")]
    pub silence_id: String,
}
