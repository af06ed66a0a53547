//! Capture or lift the locks on a resource group

use anyhow::{Context, Result};
use apim_access_cli::args::{LockOperation, LocksCli};
use apim_access_cli::{input, run, Engine};
use apim_access_reconcile::{RunReport, ThreadSleeper};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = match run::parse_args::<LocksCli>() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    run::finish(execute(cli))
}

fn execute(cli: LocksCli) -> Result<RunReport> {
    let config = run::bootstrap(&cli.global)?;
    let subscription = config.subscription(cli.subscription.as_deref())?;
    let engine = Engine::new(run::arm_backend(&config, &subscription)?, Arc::new(ThreadSleeper), &config);

    match cli.operation {
        LockOperation::Identify => {
            let snapshot = engine.identify_locks(&cli.resource_group)?;
            println!("{}", snapshot.to_json().context("Failed to serialize lock snapshot")?);
            Ok(RunReport::new())
        }
        LockOperation::Remove => {
            let snapshot = match cli.locks_json.as_deref() {
                Some(arg) => Some(input::parse_lock_snapshot(&input::read_json_arg(arg)?)?),
                None => None,
            };
            Ok(engine.remove_locks(&cli.resource_group, snapshot)?)
        }
    }
}
