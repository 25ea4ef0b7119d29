//! CI/CD API response models and their domain counterparts.

use serde::{Deserialize, Deserializer};

use crate::error::RollbackError;
use crate::status::StatusClass;

// ============================================================================
// Wire types
// ============================================================================

/// Envelope wrapping every CI/CD API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    /// Operation payload. Absent on error bodies.
    pub result: Option<ProgressResult>,
}

/// Payload of a rollback or progress response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressResult {
    /// Links to follow-up resources.
    #[serde(default)]
    pub links: Option<ProgressLinks>,
    /// Numeric status code, sent as a string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    /// Human readable status.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status_label: String,
    /// Status message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status_message: String,
    /// Status detail.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status_detail: String,
    /// Error text, empty when there is none.
    #[serde(default)]
    pub error: Option<String>,
    /// Completion percentage.
    #[serde(default)]
    pub percent_complete: Option<f64>,
    /// Version the application was rolled back to.
    #[serde(default)]
    pub rollback_version: Option<String>,
}

/// Links section of a response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressLinks {
    /// Progress resource for the running operation.
    pub progress: Option<ProgressLink>,
}

/// A single progress link.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgressLink {
    /// Progress record ID.
    pub id: String,
    /// Absolute URL to poll.
    pub url: String,
}

/// The API quotes status codes inconsistently and sends `null` for empty text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

// ============================================================================
// Domain types
// ============================================================================

/// Identifier and URL used to poll a running rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressHandle {
    /// Progress record ID.
    pub id: String,
    /// URL to poll.
    pub url: String,
}

/// A snapshot of the rollback progress taken from a single response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStatus {
    /// Raw status code.
    pub code: String,
    /// Status label.
    pub label: String,
    /// Status message.
    pub message: String,
    /// Status detail.
    pub detail: String,
    /// Error text, `None` when the API sent nothing or an empty string.
    pub error: Option<String>,
    /// Completion percentage in `0..=100`.
    pub percent_complete: u8,
    /// Version rolled back to, present once the rollback succeeded.
    pub rollback_version: Option<String>,
    /// Classification of `code` and `label`.
    pub class: StatusClass,
}

impl ProgressStatus {
    /// Short human readable summary, e.g. `Running (40%)`.
    #[must_use]
    pub fn summary(&self) -> String {
        let label = if self.label.is_empty() {
            self.class.to_string()
        } else {
            self.label.clone()
        };
        format!("{label} ({}%)", self.percent_complete)
    }

    /// Best available description of why the operation failed.
    #[must_use]
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| (!self.message.is_empty()).then(|| self.message.clone()))
            .or_else(|| (!self.detail.is_empty()).then(|| self.detail.clone()))
            .unwrap_or_else(|| format!("status {} ({})", self.code, self.label))
    }

    /// Convert into the error reported for a failed rollback.
    #[must_use]
    pub fn into_error(self) -> RollbackError {
        RollbackError::RemoteOperation {
            message: self.failure_message(),
            detail: self.detail,
            error: self.error,
        }
    }
}

impl From<ProgressResult> for ProgressStatus {
    fn from(result: ProgressResult) -> Self {
        let class = StatusClass::classify(&result.status, &result.status_label);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent_complete = result
            .percent_complete
            .map_or(0, |p| p.clamp(0.0, 100.0).round() as u8);

        Self {
            code: result.status,
            label: result.status_label,
            message: result.status_message,
            detail: result.status_detail,
            error: result.error.filter(|e| !e.trim().is_empty()),
            percent_complete,
            rollback_version: result.rollback_version.filter(|v| !v.is_empty()),
            class,
        }
    }
}

impl ApiResponse {
    /// Extract the progress handle and initial status of a rollback request.
    ///
    /// # Errors
    /// Returns `MalformedResponse` if the body has no result or no progress link.
    pub fn into_rollback_started(self) -> Result<(ProgressHandle, ProgressStatus), RollbackError> {
        let mut result = self
            .result
            .ok_or_else(|| RollbackError::malformed("response has no result"))?;

        let link = result
            .links
            .take()
            .and_then(|links| links.progress)
            .ok_or_else(|| RollbackError::malformed("response has no progress link"))?;

        if link.url.is_empty() {
            return Err(RollbackError::malformed("progress link has an empty url"));
        }

        let handle = ProgressHandle {
            id: link.id,
            url: link.url,
        };

        Ok((handle, result.into()))
    }

    /// Extract the status from a progress poll.
    ///
    /// # Errors
    /// Returns `MalformedResponse` if the body has no result.
    pub fn into_progress(self) -> Result<ProgressStatus, RollbackError> {
        self.result
            .map(ProgressStatus::from)
            .ok_or_else(|| RollbackError::malformed("progress response has no result"))
    }
}
