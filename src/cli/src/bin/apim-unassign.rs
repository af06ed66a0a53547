//! Remove access granted by apim-assign

use anyhow::Result;
use apim_access_cli::args::UnassignCli;
use apim_access_cli::{input, run, Engine};
use apim_access_reconcile::{RunReport, ThreadSleeper};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = match run::parse_args::<UnassignCli>() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    run::finish(execute(cli))
}

fn execute(cli: UnassignCli) -> Result<RunReport> {
    let config = run::bootstrap(&cli.global)?;
    let roles = input::parse_role_names(&input::read_json_arg(&cli.roles_json)?)?;
    let subscription = config.subscription(cli.subscription.as_deref())?;
    let engine = Engine::new(run::arm_backend(&config, &subscription)?, Arc::new(ThreadSleeper), &config);

    Ok(engine.unassign(&cli.identity, &roles)?)
}
