//! ServiceNow CI/CD API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::error::RollbackError;
use crate::models::ApiResponse;

/// User agent the CI/CD API expects from GitHub integrations.
pub const USER_AGENT_VALUE: &str = "sncicd_extint_github";

/// Default timeout for a single API request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Calls issued by the rollback workflow.
#[async_trait]
pub trait RollbackApi: Send + Sync {
    /// Start a rollback by POSTing to the fully built rollback URL.
    async fn request_rollback(&self, url: &str) -> Result<ApiResponse, RollbackError>;

    /// Fetch the progress resource returned by the rollback request.
    async fn fetch_progress(&self, url: &str) -> Result<ApiResponse, RollbackError>;
}

/// reqwest implementation of [`RollbackApi`].
///
/// One connection pool is shared by the rollback request and every poll.
#[derive(Clone)]
pub struct ServiceNowClient {
    /// HTTP client.
    client: Client,
    /// Basic auth credentials.
    credentials: Credentials,
}

impl ServiceNowClient {
    /// Create a new client.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn new(credentials: Credentials) -> Result<Self, RollbackError> {
        Self::with_timeout(credentials, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new client with a custom per-request timeout.
    ///
    /// # Errors
    /// Returns error if HTTP client cannot be created.
    pub fn with_timeout(
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, RollbackError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            credentials,
        })
    }

    /// Handle API response, parsing JSON or error.
    async fn handle_response(response: reqwest::Response) -> Result<ApiResponse, RollbackError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| {
                warn!(error = %e, body = %text, "Failed to parse response");
                RollbackError::malformed(format!("invalid JSON body: {e}"))
            })
        } else {
            Err(RollbackError::Http {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl RollbackApi for ServiceNowClient {
    async fn request_rollback(&self, url: &str) -> Result<ApiResponse, RollbackError> {
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "application/json")
            .json(&serde_json::json!({}))
            .send()
            .await?;

        Self::handle_response(response).await
    }

    async fn fetch_progress(&self, url: &str) -> Result<ApiResponse, RollbackError> {
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Self::handle_response(response).await
    }
}
