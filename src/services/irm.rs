//! IRM API client service
//!
//! Alert group reads and the two state transitions the synchronizer drives
//! (resolve, unsilence), plus cached user lookups for metric enrichment.
//! The API token is sent verbatim in the Authorization header.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::IrmConfig;
use crate::models::{AlertGroup, AlertGroupPage, User};
use crate::utils::UpstreamError;

/// IRM API client
pub struct IrmClient {
    client: Client,
    base_url: String,
    token: String,
    user_cache: RwLock<HashMap<String, User>>,
}

impl IrmClient {
    /// Create a new client for the given base URL and token
    pub fn new(config: &IrmConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .use_rustls_tls()
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!("IRM client initialized for {}", base_url);

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            user_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Fetch all alert groups, in all states
    pub async fn fetch_all_alert_groups(&self) -> Result<Vec<AlertGroup>, UpstreamError> {
        let url = format!("{}/api/v1/alert_groups", self.base_url);
        debug!("Fetching all alert groups from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let page: AlertGroupPage = handle_response(response).await?;
        Ok(page.results)
    }

    /// Mark an alert group resolved. Repeats are a no-op upstream.
    pub async fn resolve_alert_group(&self, group_id: &str) -> Result<(), UpstreamError> {
        self.post_group_action(group_id, "resolve").await?;
        info!("Resolved alert group {}", group_id);
        Ok(())
    }

    /// Remove the silence state from an alert group
    pub async fn unsilence_alert_group(&self, group_id: &str) -> Result<(), UpstreamError> {
        self.post_group_action(group_id, "unsilence").await?;
        info!("Unsilenced alert group {}", group_id);
        Ok(())
    }

    async fn post_group_action(&self, group_id: &str, action: &str) -> Result<(), UpstreamError> {
        let url = format!(
            "{}/api/v1/alert_groups/{}/{}",
            self.base_url,
            urlencoding::encode(group_id),
            action
        );
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(UpstreamError::Rejected { status, body })
        }
    }

    /// Look up a user by id, going to the API at most once per id.
    ///
    /// A blank id short-circuits to `None` with no I/O and no cache write.
    /// Failed lookups are not cached.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, UpstreamError> {
        if user_id.is_empty() {
            return Ok(None);
        }

        {
            let cache = self.user_cache.read().await;
            if let Some(user) = cache.get(user_id) {
                return Ok(Some(user.clone()));
            }
        }

        let url = format!(
            "{}/api/v1/users/{}",
            self.base_url,
            urlencoding::encode(user_id)
        );
        debug!("Fetching user from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(UpstreamError::from_transport)?;

        let user: User = handle_response(response).await?;

        let mut cache = self.user_cache.write().await;
        cache
            .entry(user_id.to_string())
            .or_insert_with(|| user.clone());
        debug!("Cached user {} (email: {})", user_id, user.email);

        Ok(Some(user))
    }

    /// The email of a user, or empty on absence or any failure.
    ///
    /// Lookup errors are swallowed because the email only ever becomes a
    /// metric label value.
    pub async fn user_email(&self, user_id: &str) -> String {
        match self.get_user(user_id).await {
            Ok(Some(user)) => user.email,
            Ok(None) => String::new(),
            Err(err) => {
                warn!("Failed to fetch user {}: {}", user_id, err);
                String::new()
            }
        }
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
