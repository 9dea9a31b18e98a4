//! Alertmanager client service
//!
//! Read side: the full alert set and silence lookups. Write side: silence
//! creation for the webhook path. Silence lookups go through a process-wide
//! cache keyed by silence id; entries are inserted once and never evicted,
//! so repeated metric publishes do not re-query the same author.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::AlertmanagerConfig;
use crate::models::{Alert, CreatedSilence, PostableSilence, Silence};
use crate::utils::UpstreamError;

/// Alertmanager API client
pub struct AlertmanagerClient {
    client: Client,
    base_url: String,
    silence_cache: RwLock<HashMap<String, Silence>>,
}

impl AlertmanagerClient {
    /// Create a new client for the given host:port
    pub fn new(config: &AlertmanagerConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .use_rustls_tls()
            .build()?;

        let base_url = format!("http://{}/api/v2", config.host.trim_end_matches('/'));
        info!("Alertmanager client initialized for {}", base_url);

        Ok(Self {
            client,
            base_url,
            silence_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Fetch the current snapshot of all alerts, in any state
    pub async fn fetch_all_alerts(&self) -> Result<Vec<Alert>, UpstreamError> {
        let url = format!("{}/alerts", self.base_url);
        debug!("Fetching all alerts from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        handle_response(response).await
    }

    /// Look up a silence by id, going to the API at most once per id.
    ///
    /// A blank id short-circuits to `None` with no I/O and no cache write.
    /// Failed lookups are not cached.
    pub async fn get_silence(&self, silence_id: &str) -> Result<Option<Silence>, UpstreamError> {
        if silence_id.is_empty() {
            return Ok(None);
        }

        {
            let cache = self.silence_cache.read().await;
            if let Some(silence) = cache.get(silence_id) {
                return Ok(Some(silence.clone()));
            }
        }

        let url = format!(
            "{}/silence/{}",
            self.base_url,
            urlencoding::encode(silence_id)
        );
        debug!("Fetching silence from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let silence: Silence = handle_response(response).await?;

        let mut cache = self.silence_cache.write().await;
        let entry = cache
            .entry(silence_id.to_string())
            .or_insert_with(|| silence.clone());
        debug!(
            "Cached silence {} (author: {})",
            silence_id, entry.created_by
        );

        Ok(Some(silence))
    }

    /// The `created_by` of a silence, or empty on any failure.
    ///
    /// Lookup errors are swallowed because the author only ever becomes a
    /// metric label value.
    pub async fn silence_author(&self, silence_id: &str) -> String {
        match self.get_silence(silence_id).await {
            Ok(Some(silence)) => silence.created_by,
            Ok(None) => String::new(),
            Err(err) => {
                warn!("Failed to fetch silence {}: {}", silence_id, err);
                String::new()
            }
        }
    }

    /// Create a new silence; returns the id assigned by Alertmanager
    pub async fn create_silence(&self, spec: &PostableSilence) -> Result<String, UpstreamError> {
        let url = format!("{}/silences", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(spec)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let created: CreatedSilence = handle_response(response).await?;
        info!(
            "Created silence {} (author: {}, comment: {})",
            created.silence_id, spec.created_by, spec.comment
        );
        Ok(created.silence_id)
    }
}

/// Map a response to the shared failure taxonomy and decode the body
async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, UpstreamError> {
    let status = response.status();

    if status.is_success() {
        let body = response
            .text()
            .await
            .map_err(UpstreamError::from_transport)?;
        serde_json::from_str(&body).map_err(UpstreamError::Decode)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(UpstreamError::Rejected { status, body })
    }
}
