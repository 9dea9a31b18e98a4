//! Configuration management
//!
//! All configuration comes from the environment; there is no config file.
//! Missing required values are fatal before the listener opens.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::env;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub alertmanager: AlertmanagerConfig,
    pub irm: Option<IrmConfig>,
    pub webhook: Option<WebhookConfig>,
    pub export: ExportConfig,
    /// Reconciliation period in seconds; `None` disables the loop
    pub reconcile_interval_secs: Option<u64>,
    /// Export-only fallback period when IRM is not configured
    pub alert_export_interval_secs: Option<u64>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
}

/// Alertmanager connection configuration
#[derive(Debug, Clone)]
pub struct AlertmanagerConfig {
    /// host:port of the Alertmanager HTTP API
    pub host: String,
    pub timeout_secs: u64,
}

/// IRM connection configuration
#[derive(Debug, Clone)]
pub struct IrmConfig {
    pub base_url: String,
    /// Sent verbatim in the Authorization header
    pub token: String,
    pub timeout_secs: u64,
}

/// Webhook endpoint credentials and policy
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub username: String,
    pub password: String,
    pub email_allowlist: HashSet<String>,
}

/// Metric label projection configuration
#[derive(Debug, Clone, Default)]
pub struct ExportConfig {
    /// Alert label names projected into metric labels
    pub labels: Vec<String>,
    /// Alert annotation names projected into metric labels
    pub annotations: Vec<String>,
}

impl AppConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let server = ServerConfig {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 8080)?,
        };

        let logging = LoggingConfig {
            level: env_or("LOG_LEVEL", "info"),
            format: parse_log_format(&env_or("LOG_FORMAT", "compact"))?,
        };

        let alertmanager = AlertmanagerConfig {
            host: env_or("ALERTMANAGER_HOST", "localhost:9093"),
            timeout_secs: parse_env("ALERTMANAGER_TIMEOUT", 10)?,
        };

        let irm = match non_empty_env("IRM_BASE_URL") {
            Some(base_url) => {
                let token = non_empty_env("IRM_TOKEN")
                    .context("IRM_TOKEN must be set when IRM_BASE_URL is configured")?;
                Some(IrmConfig {
                    base_url,
                    token,
                    timeout_secs: parse_env("IRM_TIMEOUT", 10)?,
                })
            }
            None => None,
        };

        // The webhook endpoint only exists alongside the IRM integration,
        // and must never come up without credentials.
        let webhook = if irm.is_some() {
            let username = non_empty_env("WEBHOOK_USERNAME")
                .context("WEBHOOK_USERNAME must be set when IRM_BASE_URL is configured")?;
            let password = non_empty_env("WEBHOOK_PASSWORD")
                .context("WEBHOOK_PASSWORD must be set when IRM_BASE_URL is configured")?;
            let email_allowlist = parse_list(&env_or("WEBHOOK_EMAIL_ALLOWLIST", ""))
                .into_iter()
                .collect();
            Some(WebhookConfig {
                username,
                password,
                email_allowlist,
            })
        } else {
            None
        };

        let export = ExportConfig {
            labels: parse_list(&env_or("ALERT_EXPORT_LABELS", "")),
            annotations: parse_list(&env_or("ALERT_EXPORT_ANNOTATIONS", "")),
        };

        Ok(Self {
            server,
            logging,
            alertmanager,
            irm,
            webhook,
            export,
            reconcile_interval_secs: parse_interval("RECONCILE_INTERVAL")?,
            alert_export_interval_secs: parse_interval("ALERT_EXPORT_INTERVAL")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_env(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {}", key, raw)),
        None => Ok(default),
    }
}

/// A period in seconds; unset or 0 disables the corresponding loop
fn parse_interval(key: &str) -> Result<Option<u64>> {
    match non_empty_env(key) {
        Some(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{} must be a non-negative integer (seconds), got {}", key, raw))?;
            Ok((secs > 0).then_some(secs))
        }
        None => Ok(None),
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "compact" => Ok(LogFormat::Compact),
        "pretty" => Ok(LogFormat::Pretty),
        other => bail!("invalid LOG_FORMAT: {} (expected json, compact or pretty)", other),
    }
}

/// Parse a comma-separated list, trimming whitespace and dropping empty items
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
