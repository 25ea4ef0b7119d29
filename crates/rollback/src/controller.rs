//! Rollback orchestration.
//!
//! [`RollbackController`] drives a single rollback from request to terminal
//! status:
//!
//! ```text
//! Created ──POST──▶ Requested ──progress link──▶ Polling ──▶ Succeeded
//!    │                  │                          │  ▲
//!    └──────────────────┴────────▶ Failed ◀────────┘  └─ pending, sleep
//! ```

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::client::RollbackApi;
use crate::clock::{Clock, TokioClock};
use crate::config::{ActionInputs, Identifier, InputProvider, RollbackConfig};
use crate::error::RollbackError;
use crate::models::{ApiResponse, ProgressHandle, ProgressStatus};
use crate::status::StatusClass;

/// Domain every instance lives under.
pub const PLATFORM_DOMAIN: &str = "service-now.com";

/// Path of the application rollback endpoint.
pub const ROLLBACK_PATH: &str = "api/sn_cicd/app_repo/rollback";

/// Name of the action input carrying the target version.
pub const VERSION_INPUT: &str = "version";

/// Parameters of a rollback request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Application to roll back.
    pub identifier: Identifier,
    /// Version to roll back to.
    pub version: String,
}

/// Lifecycle of a single rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackState {
    Created,
    Requested,
    Polling,
    Succeeded,
    Failed,
}

impl fmt::Display for RollbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Requested => write!(f, "requested"),
            Self::Polling => write!(f, "polling"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of a successful rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackOutcome {
    /// Terminal status.
    pub status: ProgressStatus,
    /// Version the application now runs, as last reported by the platform.
    pub rollback_version: Option<String>,
    /// Number of progress polls issued after the initial request.
    pub polls: u32,
}

/// Requests a rollback and polls it to completion.
pub struct RollbackController {
    config: RollbackConfig,
    api: Arc<dyn RollbackApi>,
    inputs: Arc<dyn InputProvider>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    state: RollbackState,
}

impl RollbackController {
    /// Create a controller reading action inputs from the environment.
    #[must_use]
    pub fn new(config: RollbackConfig, api: Arc<dyn RollbackApi>) -> Self {
        Self {
            config,
            api,
            inputs: Arc::new(ActionInputs),
            clock: Arc::new(TokioClock),
            cancel: CancellationToken::new(),
            state: RollbackState::Created,
        }
    }

    /// Use a different source of action inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Arc<dyn InputProvider>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Use a different clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Abort polling when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RollbackState {
        self.state
    }

    /// Configuration this controller was built with.
    #[must_use]
    pub const fn config(&self) -> &RollbackConfig {
        &self.config
    }

    /// Build the rollback request URL.
    ///
    /// The identifying parameter always precedes `version`.
    ///
    /// # Errors
    /// Returns `Configuration` if the instance or identifier is empty, or the
    /// instance does not form a valid host name.
    pub fn build_request_url(&self, options: &RequestOptions) -> Result<String, RollbackError> {
        let instance = self.config.instance.trim();
        let (param, value) = options.identifier.query_pair();

        if instance.is_empty() || value.trim().is_empty() {
            return Err(RollbackError::config("Incorrect config"));
        }

        let host = format!("{instance}.{PLATFORM_DOMAIN}");
        let mut url = Url::parse(&format!("https://{host}/{ROLLBACK_PATH}"))
            .map_err(|e| RollbackError::config(format!("Incorrect config: {e}")))?;

        if !url
            .host_str()
            .is_some_and(|h| h.eq_ignore_ascii_case(&host))
        {
            return Err(RollbackError::config(format!(
                "Incorrect config: invalid instance '{instance}'"
            )));
        }

        url.query_pairs_mut()
            .append_pair(param, value)
            .append_pair("version", &options.version);

        Ok(url.into())
    }

    /// Read the target version from the action inputs.
    ///
    /// # Errors
    /// Returns `MissingVersion` if the input is unset or blank.
    pub fn get_input_version(&self) -> Result<String, RollbackError> {
        self.inputs
            .get_input(VERSION_INPUT)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(RollbackError::MissingVersion)
    }

    /// Roll the application back and wait until the platform finishes.
    ///
    /// # Errors
    /// Returns the first configuration, transport, or remote error met, or
    /// `Timeout`/`Cancelled` if polling is cut short.
    pub async fn rollback_app(&mut self) -> Result<RollbackOutcome, RollbackError> {
        let result = self.run().await;

        match &result {
            Ok(outcome) => {
                info!(
                    rollback_version = outcome.rollback_version.as_deref().unwrap_or("unknown"),
                    polls = outcome.polls,
                    "Rollback completed"
                );
                self.transition(RollbackState::Succeeded);
            }
            Err(e) => {
                error!(error = %e, state = %self.state, "Rollback failed");
                self.transition(RollbackState::Failed);
            }
        }

        result
    }

    async fn run(&mut self) -> Result<RollbackOutcome, RollbackError> {
        let version = self.get_input_version()?;
        let url = self.build_request_url(&RequestOptions {
            identifier: self.config.identifier.clone(),
            version: version.clone(),
        })?;

        if self.cancel.is_cancelled() {
            return Err(RollbackError::Cancelled { last_status: None });
        }

        info!(
            instance = %self.config.instance,
            target = %self.config.identifier,
            version = %version,
            "Requesting application rollback"
        );

        self.transition(RollbackState::Requested);
        let (handle, status) = self
            .api
            .request_rollback(&url)
            .await?
            .into_rollback_started()?;

        info!(progress_id = %handle.id, "Rollback started");
        self.transition(RollbackState::Polling);

        self.poll(&handle, status).await
    }

    async fn poll(
        &self,
        handle: &ProgressHandle,
        mut status: ProgressStatus,
    ) -> Result<RollbackOutcome, RollbackError> {
        let started = self.clock.now();
        let mut rollback_version = status.rollback_version.clone();
        let mut polls = 0;

        loop {
            report_progress(&status);

            match status.class {
                StatusClass::Succeeded => {
                    return Ok(RollbackOutcome {
                        rollback_version: status.rollback_version.clone().or(rollback_version),
                        status,
                        polls,
                    });
                }
                StatusClass::Failed => return Err(status.into_error()),
                StatusClass::Pending => {}
            }

            let next = self.fetch_next(handle, started, &status, &mut polls).await?;
            if next.rollback_version.is_some() {
                rollback_version.clone_from(&next.rollback_version);
            }
            status = next;
        }
    }

    /// Wait one interval, then poll, retrying transient transport failures.
    async fn fetch_next(
        &self,
        handle: &ProgressHandle,
        started: std::time::Instant,
        last: &ProgressStatus,
        polls: &mut u32,
    ) -> Result<ProgressStatus, RollbackError> {
        let policy = self.config.poll;
        let mut failures = 0;

        loop {
            self.pause(last).await?;
            self.check_deadline(started, last)?;

            *polls += 1;
            let result = self
                .api
                .fetch_progress(&handle.url)
                .await
                .and_then(ApiResponse::into_progress);

            match result {
                Ok(status) => return Ok(status),
                Err(e) if e.is_transient() && failures < policy.max_transport_retries => {
                    failures += 1;
                    warn!(
                        error = %e,
                        attempt = failures,
                        max_retries = policy.max_transport_retries,
                        "Progress poll failed, retrying"
                    );
                }
                Err(e) => return Err(e.while_polling(last.summary())),
            }
        }
    }

    async fn pause(&self, last: &ProgressStatus) -> Result<(), RollbackError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(RollbackError::Cancelled {
                last_status: Some(last.summary()),
            }),
            () = self.clock.sleep(self.config.poll.interval) => Ok(()),
        }
    }

    fn check_deadline(
        &self,
        started: std::time::Instant,
        last: &ProgressStatus,
    ) -> Result<(), RollbackError> {
        if self.cancel.is_cancelled() {
            return Err(RollbackError::Cancelled {
                last_status: Some(last.summary()),
            });
        }

        let elapsed = self.clock.now().saturating_duration_since(started);
        if elapsed >= self.config.poll.timeout {
            return Err(RollbackError::Timeout {
                elapsed_secs: elapsed.as_secs(),
                last_status: Some(last.summary()),
            });
        }

        Ok(())
    }

    fn transition(&mut self, next: RollbackState) {
        debug!(from = %self.state, to = %next, "Rollback state transition");
        self.state = next;
    }
}

fn report_progress(status: &ProgressStatus) {
    info!(
        percent_complete = status.percent_complete,
        status = %status.label,
        message = %status.message,
        "Rollback progress"
    );
    if !status.detail.is_empty() {
        debug!(detail = %status.detail, "Rollback status detail");
    }
}
