//! Error types for the rollback workflow.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while rolling back an application.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// Required settings are missing or inconsistent.
    #[error("{message}. Configure Github secrets please")]
    Configuration { message: String },

    /// The `version` action input was not provided.
    #[error("Version is not set")]
    MissingVersion,

    /// The API answered with a body that lacks the expected shape.
    #[error("Malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The platform reported the rollback as failed.
    #[error("Rollback failed: {message}")]
    RemoteOperation {
        message: String,
        detail: String,
        error: Option<String>,
    },

    /// Polling did not reach a terminal status in time.
    #[error(
        "Rollback timed out after {elapsed_secs}s (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        elapsed_secs: u64,
        last_status: Option<String>,
    },

    /// Polling was aborted by the caller.
    #[error(
        "Rollback cancelled (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    Cancelled { last_status: Option<String> },

    /// A progress poll failed after the rollback had started.
    #[error("{source} (last status: {last_status})")]
    Polling {
        last_status: String,
        #[source]
        source: Box<RollbackError>,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// API returned a non-success status code.
    #[error("API error: {status} - {message}")]
    Http { status: u16, message: String },
}

impl RollbackError {
    /// Create a configuration error with the given message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a malformed-response error with the given reason.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Attach the last known progress to an error raised while polling.
    #[must_use]
    pub fn while_polling(self, last_status: String) -> Self {
        match self {
            Self::Timeout { .. } | Self::Cancelled { .. } | Self::Polling { .. } => self,
            source => Self::Polling {
                last_status,
                source: Box::new(source),
            },
        }
    }

    /// Error that caused a polling failure, or `self` otherwise.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Polling { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether retrying the same request could succeed.
    ///
    /// Only network-level failures and server-side HTTP errors qualify;
    /// a failed rollback reported by the platform never does.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || StatusCode::from_u16(*status).is_ok_and(|s| s.is_server_error())
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_has_guidance() {
        let err = RollbackError::config("Incorrect config");
        assert_eq!(
            err.to_string(),
            "Incorrect config. Configure Github secrets please"
        );
    }

    #[test]
    fn test_timeout_message_includes_last_status() {
        let err = RollbackError::Timeout {
            elapsed_secs: 30,
            last_status: Some("Running (40%)".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Rollback timed out after 30s (last status: Running (40%))"
        );

        let err = RollbackError::Cancelled { last_status: None };
        assert_eq!(err.to_string(), "Rollback cancelled (last status: unknown)");
    }

    #[test]
    fn test_transient_classification() {
        let server = RollbackError::Http {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(server.is_transient());

        let throttled = RollbackError::Http {
            status: 429,
            message: String::new(),
        };
        assert!(throttled.is_transient());

        let unauthorized = RollbackError::Http {
            status: 401,
            message: "bad credentials".to_string(),
        };
        assert!(!unauthorized.is_transient());

        let remote = RollbackError::RemoteOperation {
            message: "failed".to_string(),
            detail: String::new(),
            error: None,
        };
        assert!(!remote.is_transient());
        assert!(!RollbackError::MissingVersion.is_transient());
    }

    #[test]
    fn test_polling_error_carries_last_status() {
        let err = RollbackError::Http {
            status: 503,
            message: "down".to_string(),
        }
        .while_polling("Running (40%)".to_string());

        assert_eq!(
            err.to_string(),
            "API error: 503 - down (last status: Running (40%))"
        );
        assert!(matches!(err.root(), RollbackError::Http { status: 503, .. }));

        let timeout = RollbackError::Timeout {
            elapsed_secs: 5,
            last_status: None,
        }
        .while_polling("Running (40%)".to_string());
        assert!(matches!(timeout, RollbackError::Timeout { .. }));
    }
}
