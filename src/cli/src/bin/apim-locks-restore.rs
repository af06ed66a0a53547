//! Recreate locks from a snapshot

use anyhow::Result;
use apim_access_cli::args::RestoreCli;
use apim_access_cli::{input, run, Engine};
use apim_access_reconcile::{RunReport, ThreadSleeper};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = match run::parse_args::<RestoreCli>() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    run::finish(execute(cli))
}

fn execute(cli: RestoreCli) -> Result<RunReport> {
    let config = run::bootstrap(&cli.global)?;
    let snapshot = input::parse_lock_snapshot(&input::read_json_arg(&cli.locks_json)?)?;
    let subscription = config.subscription(cli.subscription.as_deref())?;
    let engine = Engine::new(run::arm_backend(&config, &subscription)?, Arc::new(ThreadSleeper), &config);

    Ok(engine.restore_locks(&cli.resource_group, &snapshot)?)
}
