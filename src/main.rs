//! alert-sync - Alertmanager / IRM synchronizer
//!
//! Binds the HTTP ingress, drives the background reconciliation loop, and
//! wires the Alertmanager and IRM clients into the shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

use alert_sync::config::LogFormat;
use alert_sync::services::{run_export_loop, AlertmanagerClient, Exporter, IrmClient, Reconciler};
use alert_sync::{api, AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first, so logging knows its format. Missing required
    // values abort here, before anything is bound.
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_logging(&config);

    info!("alert-sync {} starting up", env!("CARGO_PKG_VERSION"));

    let am = Arc::new(
        AlertmanagerClient::new(&config.alertmanager)
            .context("Failed to initialize Alertmanager client")?,
    );

    let irm = match &config.irm {
        Some(irm_config) => Some(Arc::new(
            IrmClient::new(irm_config).context("Failed to initialize IRM client")?,
        )),
        None => {
            warn!("IRM not configured, reconciliation and webhook features disabled");
            None
        }
    };

    let exporter =
        Arc::new(Exporter::new(&config.export).context("Failed to initialize metrics exporter")?);

    let reconciler = irm
        .as_ref()
        .map(|irm| Arc::new(Reconciler::new(am.clone(), irm.clone(), exporter.clone())));

    // One token covers every background loop and in-flight cycle; it is
    // cancelled when the server begins shutting down.
    let shutdown = CancellationToken::new();

    match (&reconciler, config.reconcile_interval_secs) {
        (Some(reconciler), Some(secs)) => {
            info!("Background reconciliation enabled (interval: {}s)", secs);
            tokio::spawn(
                reconciler
                    .clone()
                    .run_loop(Duration::from_secs(secs), shutdown.clone()),
            );
        }
        (Some(_), None) => {
            info!("Background reconciliation disabled (set RECONCILE_INTERVAL to enable)");
        }
        (None, _) => match config.alert_export_interval_secs {
            Some(secs) => {
                info!("Background alert export enabled (interval: {}s)", secs);
                tokio::spawn(run_export_loop(
                    am.clone(),
                    exporter.clone(),
                    Duration::from_secs(secs),
                    shutdown.clone(),
                ));
            }
            None => {
                info!("Background alert export disabled (set ALERT_EXPORT_INTERVAL to enable)");
            }
        },
    }

    let state = AppState {
        am,
        irm,
        exporter,
        reconciler,
        webhook: config.webhook.clone(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let app = api::routes(&state)
        .layer(trace_layer)
        .with_state(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints: /metrics /healthz /readyz /reconcile{}", if state.webhook.is_some() { " /webhook" } else { "" });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server error")?;

    info!("alert-sync stopped");
    Ok(())
}

/// Wait for Ctrl-C, then cancel every background loop
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        LogFormat::Compact => {
            subscriber
                .with(fmt::layer().compact().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            subscriber
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
    }
}
