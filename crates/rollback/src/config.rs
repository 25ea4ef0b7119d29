//! Rollback configuration.
//!
//! Connection settings arrive as loosely-typed strings (environment
//! variables, CLI flags) and are validated once into a [`RollbackConfig`].
//! The target version is a CI action input and is resolved separately
//! through an [`InputProvider`] at run time.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::RollbackError;

/// Default pause between two progress polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default upper bound on the whole polling phase.
pub const DEFAULT_TIMEOUT_SECS: u64 = 900;

/// Default number of consecutive transient poll failures tolerated.
pub const DEFAULT_MAX_TRANSPORT_RETRIES: u32 = 3;

/// Application the rollback targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Application `sys_id`.
    SystemId(String),
    /// Application scope.
    Scope(String),
}

impl Identifier {
    /// Query parameter name and value identifying the application.
    #[must_use]
    pub fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Self::SystemId(id) => ("sys_id", id),
            Self::Scope(scope) => ("scope", scope),
        }
    }

    /// Pick an identifier from optional settings. A system ID wins over a scope.
    #[must_use]
    pub fn from_parts(sys_id: Option<&str>, scope: Option<&str>) -> Option<Self> {
        fn non_empty(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        non_empty(sys_id)
            .map(|id| Self::SystemId(id.to_string()))
            .or_else(|| non_empty(scope).map(|s| Self::Scope(s.to_string())))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, value) = self.query_pair();
        write!(f, "{name}={value}")
    }
}

/// Basic auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Timing of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Fixed pause between polls.
    pub interval: Duration,
    /// Maximum time spent polling before giving up.
    pub timeout: Duration,
    /// Consecutive transient failures tolerated while polling.
    pub max_transport_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_transport_retries: DEFAULT_MAX_TRANSPORT_RETRIES,
        }
    }
}

/// Validated configuration of a rollback run.
#[derive(Debug, Clone)]
pub struct RollbackConfig {
    /// Instance name, the first label of `{instance}.service-now.com`.
    pub instance: String,
    /// Credentials for basic auth.
    pub credentials: Credentials,
    /// Application to roll back.
    pub identifier: Identifier,
    /// Polling timing.
    pub poll: PollPolicy,
}

/// Raw, unvalidated settings as provided by the environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub instance: Option<String>,
    pub sys_id: Option<String>,
    pub scope: Option<String>,
    pub poll: PollPolicy,
}

impl Settings {
    /// Validate the settings, reporting every missing item at once.
    ///
    /// # Errors
    /// Returns `Configuration` listing each missing setting.
    pub fn validate(self) -> Result<RollbackConfig, RollbackError> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|v| !v.trim().is_empty());

        let mut errors = Vec::new();
        if !present(&self.username) {
            errors.push("nowUsername is not set");
        }
        if !present(&self.password) {
            errors.push("nowPassword is not set");
        }
        if !present(&self.instance) {
            errors.push("nowInstallInstance is not set");
        }
        let identifier = Identifier::from_parts(self.sys_id.as_deref(), self.scope.as_deref());
        if identifier.is_none() {
            errors.push("appSysID or appScope is not set");
        }

        match identifier {
            Some(identifier) if errors.is_empty() => Ok(RollbackConfig {
                instance: self.instance.unwrap_or_default().trim().to_string(),
                credentials: Credentials {
                    username: self.username.unwrap_or_default(),
                    password: self.password.unwrap_or_default(),
                },
                identifier,
                poll: self.poll,
            }),
            _ => Err(RollbackError::config(errors.join(". "))),
        }
    }
}

/// Source of CI action inputs.
pub trait InputProvider: Send + Sync {
    /// Value of the named input, `None` when unset.
    fn get_input(&self, name: &str) -> Option<String>;
}

/// Action inputs exposed by the runner as `INPUT_<NAME>` environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionInputs;

impl ActionInputs {
    /// Environment variable holding the named input.
    #[must_use]
    pub fn env_key(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }
}

impl InputProvider for ActionInputs {
    fn get_input(&self, name: &str) -> Option<String> {
        std::env::var(Self::env_key(name)).ok()
    }
}

impl InputProvider for HashMap<String, String> {
    fn get_input(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_settings() -> Settings {
        Settings {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            instance: Some("test".to_string()),
            sys_id: Some("123".to_string()),
            scope: None,
            poll: PollPolicy::default(),
        }
    }

    #[test]
    fn test_validate_complete_settings() {
        let config = full_settings().validate().unwrap();
        assert_eq!(config.instance, "test");
        assert_eq!(config.credentials.username, "admin");
        assert_eq!(config.identifier, Identifier::SystemId("123".to_string()));
    }

    #[test]
    fn test_validate_reports_every_missing_setting() {
        let err = Settings::default().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "nowUsername is not set. nowPassword is not set. nowInstallInstance is not set. \
             appSysID or appScope is not set. Configure Github secrets please"
        );
    }

    #[test]
    fn test_validate_rejects_blank_values() {
        let settings = Settings {
            instance: Some("  ".to_string()),
            ..full_settings()
        };
        let err = settings.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "nowInstallInstance is not set. Configure Github secrets please"
        );
    }

    #[test]
    fn test_system_id_takes_precedence_over_scope() {
        assert_eq!(
            Identifier::from_parts(Some("123"), Some("x_app")),
            Some(Identifier::SystemId("123".to_string()))
        );
        assert_eq!(
            Identifier::from_parts(Some(""), Some("x_app")),
            Some(Identifier::Scope("x_app".to_string()))
        );
        assert_eq!(Identifier::from_parts(None, Some(" ")), None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_action_input_env_key() {
        assert_eq!(ActionInputs::env_key("version"), "INPUT_VERSION");
        assert_eq!(ActionInputs::env_key("app version"), "INPUT_APP_VERSION");
    }
}
