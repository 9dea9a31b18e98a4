//! Prometheus metrics exporter
//!
//! Owns the metric registry for the whole process: the operational series
//! describing the reconciliation engine itself, and the `alert_state` gauge
//! vector that mirrors the current Alertmanager snapshot. The label schema
//! of `alert_state` is frozen at construction; every publish drops all
//! existing series and rebuilds them from the snapshot, so series absent
//! from the snapshot disappear on the next scrape.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramTimer, IntCounter, Opts,
    Registry, TextEncoder,
};
use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::models::{Alert, AlertGroup, AlertState};
use crate::services::alertmanager::AlertmanagerClient;
use crate::services::fingerprint::{fingerprint_index, IndexMode};
use crate::services::irm::IrmClient;

/// Labels every `alert_state` series carries before the configured projections
const DEFAULT_LABELS: &[&str] = &[
    "alertname",
    "fingerprint",
    "suppressed",
    "acknowledged_by",
    "resolved_by",
    "silenced_by",
    "inhibited_by",
    "alert_group_id",
    "acknowledged_at",
    "created_at",
    "resolved_at",
];

/// Prometheus exporter for reconciliation and alert-state metrics
#[derive(Debug)]
pub struct Exporter {
    registry: Registry,

    reconciliation_total: IntCounter,
    reconciliation_failures_total: IntCounter,
    reconciliation_duration: Histogram,
    inconsistencies_found: Gauge,
    inconsistencies_resolved: IntCounter,
    inconsistencies_failed_resolve: IntCounter,
    last_reconciliation_time: Gauge,
    last_reconciliation_success: Gauge,

    alert_state: GaugeVec,
    alert_export_total: IntCounter,
    alert_export_failures_total: IntCounter,
    last_alert_export_time: Gauge,

    export_labels: Vec<String>,
    export_annotations: Vec<String>,
}

impl Exporter {
    /// Create the exporter and register every metric.
    ///
    /// Fails when a configured projection collides with the default label
    /// set or with another projection; the schema must be unambiguous for
    /// the life of the process.
    pub fn new(export: &ExportConfig) -> Result<Self> {
        let registry = Registry::new();

        let mut all_labels: Vec<&str> = DEFAULT_LABELS.to_vec();
        all_labels.extend(export.labels.iter().map(String::as_str));
        all_labels.extend(export.annotations.iter().map(String::as_str));

        let mut seen = std::collections::HashSet::new();
        for label in &all_labels {
            if !seen.insert(*label) {
                bail!(
                    "duplicate metric label {:?} in export configuration; \
                     label names must be unique across the default set, \
                     ALERT_EXPORT_LABELS and ALERT_EXPORT_ANNOTATIONS",
                    label
                );
            }
        }

        info!(
            "Alert export configuration: labels {:?}, annotations {:?}",
            export.labels, export.annotations
        );

        let reconciliation_total = IntCounter::with_opts(Opts::new(
            "alert_sync_reconciliation_total",
            "Total number of reconciliation attempts",
        ))?;
        let reconciliation_failures_total = IntCounter::with_opts(Opts::new(
            "alert_sync_reconciliation_failures_total",
            "Total number of failed reconciliation attempts",
        ))?;
        let reconciliation_duration = Histogram::with_opts(HistogramOpts::new(
            "alert_sync_reconciliation_duration_seconds",
            "Duration of reconciliation cycles in seconds",
        ))?;
        let inconsistencies_found = Gauge::with_opts(Opts::new(
            "alert_sync_inconsistencies_found",
            "Number of inconsistencies found in the last reconciliation",
        ))?;
        let inconsistencies_resolved = IntCounter::with_opts(Opts::new(
            "alert_sync_inconsistencies_resolved_total",
            "Total number of inconsistencies successfully resolved",
        ))?;
        let inconsistencies_failed_resolve = IntCounter::with_opts(Opts::new(
            "alert_sync_inconsistencies_failed_resolve_total",
            "Total number of inconsistencies that failed to resolve",
        ))?;
        let last_reconciliation_time = Gauge::with_opts(Opts::new(
            "alert_sync_last_reconciliation_timestamp_seconds",
            "Timestamp of the last reconciliation attempt (Unix time)",
        ))?;
        let last_reconciliation_success = Gauge::with_opts(Opts::new(
            "alert_sync_last_reconciliation_success",
            "Whether the last reconciliation was successful (1=success, 0=failure)",
        ))?;

        let alert_state = GaugeVec::new(
            Opts::new(
                "alert_sync_alert_state",
                "Current state of alerts from Alertmanager (1=active, 0 otherwise)",
            ),
            &all_labels,
        )?;
        let alert_export_total = IntCounter::with_opts(Opts::new(
            "alert_sync_alert_export_total",
            "Total number of alert export attempts",
        ))?;
        let alert_export_failures_total = IntCounter::with_opts(Opts::new(
            "alert_sync_alert_export_failures_total",
            "Total number of failed alert export attempts",
        ))?;
        let last_alert_export_time = Gauge::with_opts(Opts::new(
            "alert_sync_last_alert_export_timestamp_seconds",
            "Timestamp of the last alert export (Unix time)",
        ))?;

        registry.register(Box::new(reconciliation_total.clone()))?;
        registry.register(Box::new(reconciliation_failures_total.clone()))?;
        registry.register(Box::new(reconciliation_duration.clone()))?;
        registry.register(Box::new(inconsistencies_found.clone()))?;
        registry.register(Box::new(inconsistencies_resolved.clone()))?;
        registry.register(Box::new(inconsistencies_failed_resolve.clone()))?;
        registry.register(Box::new(last_reconciliation_time.clone()))?;
        registry.register(Box::new(last_reconciliation_success.clone()))?;
        registry.register(Box::new(alert_state.clone()))?;
        registry.register(Box::new(alert_export_total.clone()))?;
        registry.register(Box::new(alert_export_failures_total.clone()))?;
        registry.register(Box::new(last_alert_export_time.clone()))?;

        Ok(Self {
            registry,
            reconciliation_total,
            reconciliation_failures_total,
            reconciliation_duration,
            inconsistencies_found,
            inconsistencies_resolved,
            inconsistencies_failed_resolve,
            last_reconciliation_time,
            last_reconciliation_success,
            alert_state,
            alert_export_total,
            alert_export_failures_total,
            last_alert_export_time,
            export_labels: export.labels.clone(),
            export_annotations: export.annotations.clone(),
        })
    }

    /// Record the start of a reconciliation cycle; the returned timer
    /// observes the cycle duration when dropped
    pub fn cycle_started(&self) -> HistogramTimer {
        self.reconciliation_total.inc();
        self.last_reconciliation_time.set(unix_now());
        self.reconciliation_duration.start_timer()
    }

    /// Record a successful cycle and the size of its inconsistency set
    pub fn record_cycle_success(&self, inconsistencies_found: usize) {
        self.last_reconciliation_success.set(1.0);
        self.inconsistencies_found
            .set(inconsistencies_found as f64);
    }

    /// Record a failed cycle
    pub fn record_cycle_failure(&self) {
        self.reconciliation_failures_total.inc();
        self.last_reconciliation_success.set(0.0);
    }

    pub fn record_inconsistency_resolved(&self) {
        self.inconsistencies_resolved.inc();
    }

    pub fn record_inconsistency_failed_resolve(&self) {
        self.inconsistencies_failed_resolve.inc();
    }

    /// Record a failed export attempt (fetch or publish step)
    pub fn record_export_failure(&self) {
        self.alert_export_failures_total.inc();
    }

    /// Publish the alert-state series for one snapshot.
    ///
    /// Existing series are dropped first, so the scrape always reflects
    /// exactly the given snapshot. Group enrichment uses every group,
    /// resolved included; per-alert lookup failures collapse to empty label
    /// values and never abort the publish.
    pub async fn export_alerts(
        &self,
        alerts: &[Alert],
        groups: &[AlertGroup],
        am: &AlertmanagerClient,
        irm: Option<&IrmClient>,
    ) {
        self.alert_export_total.inc();
        self.last_alert_export_time.set(unix_now());

        self.alert_state.reset();

        let index = fingerprint_index(groups, IndexMode::All);

        for alert in alerts {
            let group = index.get(alert.fingerprint.as_str()).copied();
            let values = self.label_values(alert, group, am, irm).await;
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();

            let value = if alert.status.state == AlertState::Active {
                1.0
            } else {
                0.0
            };
            self.alert_state.with_label_values(&refs).set(value);
        }

        debug!("Published {} alert state series", alerts.len());
    }

    /// Compute the label tuple for one alert, in schema order
    async fn label_values(
        &self,
        alert: &Alert,
        group: Option<&AlertGroup>,
        am: &AlertmanagerClient,
        irm: Option<&IrmClient>,
    ) -> Vec<String> {
        let suppressed = alert.is_silenced();

        let silenced_by = match alert.status.silenced_by.first() {
            Some(id) => am.silence_author(id).await,
            None => String::new(),
        };

        let inhibited_by = alert
            .status
            .inhibited_by
            .first()
            .cloned()
            .unwrap_or_default();

        let mut acknowledged_by = String::new();
        let mut resolved_by = String::new();
        let mut alert_group_id = String::new();
        let mut acknowledged_at = String::new();
        let mut created_at = String::new();
        let mut resolved_at = String::new();

        if let Some(group) = group {
            alert_group_id = group.id.clone();
            acknowledged_at = rfc3339_or_empty(group.acknowledged_at);
            created_at = rfc3339_or_empty(group.created_at);
            resolved_at = rfc3339_or_empty(group.resolved_at);

            if let Some(irm) = irm {
                if let Some(user_id) = &group.acknowledged_by {
                    acknowledged_by = irm.user_email(user_id).await;
                }
                if let Some(user_id) = &group.resolved_by {
                    resolved_by = irm.user_email(user_id).await;
                }
            }
        }

        let mut values = vec![
            alert.alertname().to_string(),
            alert.fingerprint.clone(),
            if suppressed { "true" } else { "false" }.to_string(),
            acknowledged_by,
            resolved_by,
            silenced_by,
            inhibited_by,
            alert_group_id,
            acknowledged_at,
            created_at,
            resolved_at,
        ];

        for name in &self.export_labels {
            values.push(alert.labels.get(name).cloned().unwrap_or_default());
        }
        for name in &self.export_annotations {
            values.push(alert.annotations.get(name).cloned().unwrap_or_default());
        }

        values
    }

    /// Render every registered metric in Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Current number of `alert_state` series (used by tests)
    pub fn alert_state_series(&self) -> usize {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "alert_sync_alert_state")
            .map(|family| family.get_metric().len())
            .sum()
    }
}

fn rfc3339_or_empty(ts: Option<chrono::DateTime<chrono::Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_default()
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
