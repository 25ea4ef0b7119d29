//! ServiceNow application rollback for CI pipelines.
//!
//! This crate asks the ServiceNow CI/CD API to roll an application back to a
//! given version and follows the returned progress resource until the
//! platform reports a terminal status.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sncicd_rollback::{RollbackController, ServiceNowClient, Settings};
//!
//! # async fn run() -> Result<(), sncicd_rollback::RollbackError> {
//! let config = Settings {
//!     username: Some("admin".to_string()),
//!     password: Some("secret".to_string()),
//!     instance: Some("dev12345".to_string()),
//!     sys_id: Some("90eb4c1fdb5a3300b5ea2b0cd39619e7".to_string()),
//!     ..Settings::default()
//! }
//! .validate()?;
//!
//! let client = ServiceNowClient::new(config.credentials.clone())?;
//! let mut controller = RollbackController::new(config, Arc::new(client));
//!
//! // Reads the `version` action input from `INPUT_VERSION`.
//! let outcome = controller.rollback_app().await?;
//! println!("rolled back to {:?}", outcome.rollback_version);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`RollbackApi`] is the transport seam; [`ServiceNowClient`] implements it
//!   with reqwest
//! - [`InputProvider`] supplies CI action inputs; [`ActionInputs`] reads them
//!   from the environment
//! - [`Clock`] supplies time and delays to the polling loop

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod status;

pub use client::{RollbackApi, ServiceNowClient, USER_AGENT_VALUE};
pub use clock::{Clock, TokioClock};
pub use config::{
    ActionInputs, Credentials, Identifier, InputProvider, PollPolicy, RollbackConfig, Settings,
};
pub use controller::{RequestOptions, RollbackController, RollbackOutcome, RollbackState};
pub use error::RollbackError;
pub use models::{ProgressHandle, ProgressStatus};
pub use status::StatusClass;
