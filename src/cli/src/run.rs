//! Process plumbing shared by the binaries: argument parsing, backend
//! construction and exit status

use crate::args::GlobalArgs;
use crate::config::AccessConfig;
use crate::logging;
use anyhow::{Context, Result};
use apim_access_arm::ArmClient;
use apim_access_reconcile::{ReconcileError, RunReport};
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Parse arguments; usage errors exit 1, `--help` and `--version` exit 0
pub fn parse_args<T: Parser>() -> std::result::Result<T, ExitCode> {
    parse_args_from(std::env::args_os())
}

pub fn parse_args_from<T, I, S>(args: I) -> std::result::Result<T, ExitCode>
where
    T: Parser,
    I: IntoIterator<Item = S>,
    S: Into<std::ffi::OsString> + Clone,
{
    T::try_parse_from(args).map_err(|err| {
        let _ = err.print();
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
            _ => ExitCode::from(1),
        }
    })
}

/// Load and validate configuration, then start logging
pub fn bootstrap(global: &GlobalArgs) -> Result<AccessConfig> {
    let config = AccessConfig::load_or_default(global.config.as_deref())?;
    logging::init(&config.logging.level, global.verbose);
    if let Some(path) = &global.config {
        info!(path = %path.display(), "configuration loaded");
    }
    Ok(config)
}

/// REST backend for one subscription
pub fn arm_backend(config: &AccessConfig, subscription_id: &str) -> Result<Arc<ArmClient>> {
    let client = ArmClient::from_env(
        config.arm_config(subscription_id),
        &config.azure.arm_token_env,
        &config.azure.graph_token_env,
    )
    .context("Failed to create Azure client")?;
    Ok(Arc::new(client))
}

/// Log the outcome of a run and turn it into the process exit status
pub fn finish(result: Result<RunReport>) -> ExitCode {
    match result {
        Ok(report) => {
            for failure in report.failures() {
                error!(unit = %failure.unit, status = ?failure.status, "unit failed");
            }
            let summary = report.summary();
            if report.has_failures() {
                warn!(%summary, "finished with failures");
                ExitCode::from(1)
            } else {
                info!(%summary, "finished");
                ExitCode::SUCCESS
            }
        }
        Err(err) => fatal(&err),
    }
}

/// Log a fatal error and return exit status 1
pub fn fatal(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<ReconcileError>() {
        Some(ReconcileError::Authorization(msg)) => {
            error!(error = %msg, "caller is not authorized, aborting")
        }
        Some(other) => error!(error = %other, "run aborted"),
        None => error!(error = %format!("{:#}", err), "run aborted"),
    }
    // Configuration errors happen before logging is up
    if !tracing::dispatcher::has_been_set() {
        eprintln!("error: {:#}", err);
    }
    ExitCode::from(1)
}
