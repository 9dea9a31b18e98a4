//! Reconciliation engine
//!
//! Drives the periodic cycle: fetch both snapshots concurrently, detect
//! alerts that are silenced in Alertmanager yet still firing in the IRM,
//! resolve those groups while the same snapshot is republished as metrics,
//! then record the cycle outcome. Cycles never overlap; the next tick is
//! consumed only after the current cycle returns.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::{Alert, AlertGroup, AlertState};
use crate::services::alertmanager::AlertmanagerClient;
use crate::services::exporter::Exporter;
use crate::services::fingerprint::{fingerprint_index, IndexMode};
use crate::services::irm::IrmClient;
use crate::utils::UpstreamError;

/// An alert silenced in Alertmanager but still firing in the IRM
#[derive(Debug, Clone)]
pub struct Inconsistency {
    pub fingerprint: String,
    pub alertname: String,
    pub group_id: String,
    pub reason: &'static str,
}

const SILENCED_BUT_FIRING: &str = "silenced in Alertmanager but still firing in IRM";

/// The reconciliation engine
pub struct Reconciler {
    am: Arc<AlertmanagerClient>,
    irm: Arc<IrmClient>,
    exporter: Arc<Exporter>,
}

impl Reconciler {
    pub fn new(
        am: Arc<AlertmanagerClient>,
        irm: Arc<IrmClient>,
        exporter: Arc<Exporter>,
    ) -> Self {
        Self { am, irm, exporter }
    }

    /// Run one full reconciliation cycle against the current snapshots
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<(), UpstreamError> {
        let _timer = self.exporter.cycle_started();

        // All-or-nothing fan-out: either fetch failing fails the cycle.
        let (alerts, groups) = match tokio::join!(
            with_cancel(cancel, self.am.fetch_all_alerts()),
            with_cancel(cancel, self.irm.fetch_all_alert_groups()),
        ) {
            (Ok(alerts), Ok(groups)) => (alerts, groups),
            (am_result, irm_result) => {
                let err = am_result.err().or(irm_result.err()).expect("one side failed");
                error!("Reconciliation fetch failed: {}", err);
                self.exporter.record_cycle_failure();
                return Err(err);
            }
        };

        info!(
            "Fetched {} alerts and {} alert groups",
            alerts.len(),
            groups.len()
        );

        let inconsistencies = detect_inconsistencies(&alerts, &groups);
        info!("Found {} inconsistent alerts", inconsistencies.len());

        // Publish and resolve run concurrently over the same snapshots.
        let publish =
            self.exporter
                .export_alerts(&alerts, &groups, &self.am, Some(self.irm.as_ref()));
        let resolve = self.resolve_all(&inconsistencies, cancel);

        let ((), resolve_result) = tokio::join!(publish, resolve);

        match resolve_result {
            Ok(resolved) => {
                self.exporter.record_cycle_success(inconsistencies.len());
                info!(
                    "Reconciliation cycle complete: {} inconsistencies, {} resolved",
                    inconsistencies.len(),
                    resolved
                );
                Ok(())
            }
            Err(err) => {
                self.exporter.record_cycle_failure();
                Err(err)
            }
        }
    }

    /// Resolve each inconsistency in order. Per-item upstream failures are
    /// counted and skipped; cancellation aborts the loop and fails the
    /// cycle instead of counting as a resolve failure.
    async fn resolve_all(
        &self,
        inconsistencies: &[Inconsistency],
        cancel: &CancellationToken,
    ) -> Result<usize, UpstreamError> {
        let mut resolved = 0;

        for item in inconsistencies {
            info!(
                "Resolving alert {} (fingerprint: {}, group: {}): {}",
                item.alertname, item.fingerprint, item.group_id, item.reason
            );

            match with_cancel(cancel, self.irm.resolve_alert_group(&item.group_id)).await {
                Ok(()) => {
                    self.exporter.record_inconsistency_resolved();
                    resolved += 1;
                }
                Err(UpstreamError::Cancelled) => return Err(UpstreamError::Cancelled),
                Err(err) => {
                    warn!(
                        "Failed to resolve alert group {} for alert {}: {}",
                        item.group_id, item.alertname, err
                    );
                    self.exporter.record_inconsistency_failed_resolve();
                }
            }
        }

        Ok(resolved)
    }

    /// Run cycles on a fixed period until cancelled. The first cycle runs
    /// immediately at startup.
    pub async fn run_loop(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Reconciliation loop started (interval: {:?})", period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Reconciliation loop stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.run_cycle(&cancel).await {
                error!("Reconciliation cycle failed: {}", err);
            }
        }
    }
}

/// Compute the inconsistency set for one pair of snapshots: alerts that are
/// suppressed with at least one silence and whose fingerprint appears in a
/// non-resolved IRM group.
pub fn detect_inconsistencies(alerts: &[Alert], groups: &[AlertGroup]) -> Vec<Inconsistency> {
    let index = fingerprint_index(groups, IndexMode::SkipResolved);

    alerts
        .iter()
        .filter(|a| a.status.state == AlertState::Suppressed && a.is_silenced())
        .filter_map(|alert| {
            index
                .get(alert.fingerprint.as_str())
                .map(|group| Inconsistency {
                    fingerprint: alert.fingerprint.clone(),
                    alertname: alert.alertname().to_string(),
                    group_id: group.id.clone(),
                    reason: SILENCED_BUT_FIRING,
                })
        })
        .collect()
}

/// Export-only fallback loop used when the IRM is not configured: fetch the
/// alert snapshot and publish it without group enrichment.
pub async fn run_export_loop(
    am: Arc<AlertmanagerClient>,
    exporter: Arc<Exporter>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Alert export loop started (interval: {:?})", period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Alert export loop stopping");
                break;
            }
            _ = ticker.tick() => {}
        }

        match with_cancel(&cancel, am.fetch_all_alerts()).await {
            Ok(alerts) => {
                info!("Fetched {} alerts from Alertmanager", alerts.len());
                exporter.export_alerts(&alerts, &[], &am, None).await;
            }
            Err(err) => {
                error!("Alert export failed: {}", err);
                exporter.record_export_failure();
            }
        }
    }
}

/// Race a call against the per-cycle cancellation signal
async fn with_cancel<T, F>(cancel: &CancellationToken, call: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(UpstreamError::Cancelled),
        result = call => result,
    }
}
