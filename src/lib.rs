//! alert-sync
//!
//! Keeps an Alertmanager-style alert router and an incident-management
//! service (IRM) consistent, and publishes the current alert state as
//! Prometheus metrics.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
use config::WebhookConfig;
use services::{AlertmanagerClient, Exporter, IrmClient, Reconciler};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Alertmanager client
    pub am: Arc<AlertmanagerClient>,
    /// IRM client, absent when the integration is not configured
    pub irm: Option<Arc<IrmClient>>,
    /// Metrics exporter and registry
    pub exporter: Arc<Exporter>,
    /// Reconciliation engine, absent when the IRM is not configured
    pub reconciler: Option<Arc<Reconciler>>,
    /// Webhook credentials and allow-list, absent alongside the IRM
    pub webhook: Option<WebhookConfig>,
}
