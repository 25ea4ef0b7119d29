//! GitHub Action entry point: roll a ServiceNow application back.
//!
//! Run `sncicd-rollback --help` for usage information.

// CLI binaries legitimately need println! for workflow commands
#![allow(clippy::disallowed_macros)]

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sncicd_rollback::config::{
    DEFAULT_MAX_TRANSPORT_RETRIES, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_TIMEOUT_SECS,
};
use sncicd_rollback::{PollPolicy, RollbackController, ServiceNowClient, Settings};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sncicd-rollback")]
#[command(about = "Roll back a ServiceNow application to a previous version")]
#[command(version)]
struct Cli {
    /// ServiceNow username.
    #[arg(long, env = "nowUsername", hide_env_values = true)]
    username: Option<String>,

    /// ServiceNow password.
    #[arg(long, env = "nowPassword", hide_env_values = true)]
    password: Option<String>,

    /// Instance name, e.g. `dev12345` for dev12345.service-now.com.
    #[arg(long, env = "nowInstallInstance")]
    instance: Option<String>,

    /// Application `sys_id` (takes precedence over the scope).
    #[arg(long, env = "appSysID")]
    sys_id: Option<String>,

    /// Application scope.
    #[arg(long, env = "appScope")]
    scope: Option<String>,

    /// Seconds between progress polls.
    #[arg(
        long,
        env = "ROLLBACK_POLL_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS
    )]
    poll_interval_secs: u64,

    /// Maximum seconds to wait for the rollback to finish.
    #[arg(long, env = "ROLLBACK_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Consecutive transient poll failures tolerated.
    #[arg(
        long,
        env = "ROLLBACK_MAX_TRANSPORT_RETRIES",
        default_value_t = DEFAULT_MAX_TRANSPORT_RETRIES
    )]
    max_transport_retries: u32,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_settings(self) -> Settings {
        Settings {
            username: self.username,
            password: self.password,
            instance: self.instance,
            sys_id: self.sys_id,
            scope: self.scope,
            poll: PollPolicy {
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.timeout_secs),
                max_transport_retries: self.max_transport_retries,
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Marks the step as failed in the workflow run.
            println!("::error::{}", escape_workflow_data(&format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.into_settings().validate()?;
    let client = ServiceNowClient::new(config.credentials.clone())?;

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping rollback polling");
            signal_token.cancel();
        }
    });

    let mut controller =
        RollbackController::new(config, Arc::new(client)).with_cancellation(token);

    let outcome = controller.rollback_app().await?;

    let version = outcome.rollback_version.as_deref().unwrap_or("unknown");
    info!(rollback_version = %version, "Application rolled back");
    println!("Rollback version: {version}");

    Ok(())
}

/// Escape a message for a workflow command (`%`, CR and LF).
fn escape_workflow_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_workflow_data() {
        assert_eq!(escape_workflow_data("100% done\nnext"), "100%25 done%0Anext");
    }

    #[test]
    fn test_cli_flags_build_settings() {
        let cli = Cli::try_parse_from([
            "sncicd-rollback",
            "--username",
            "admin",
            "--password",
            "secret",
            "--instance",
            "test",
            "--scope",
            "x_app",
            "--timeout-secs",
            "30",
        ])
        .unwrap();

        let config = cli.into_settings().validate().unwrap();
        assert_eq!(config.instance, "test");
        assert_eq!(config.poll.timeout, Duration::from_secs(30));
        assert_eq!(
            config.poll.interval,
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        );
    }
}
