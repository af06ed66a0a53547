//! Grant least-privilege access to APIs or operations of one service

use anyhow::{Context, Result};
use apim_access_cli::args::{AssignCli, AssignCommand, ServiceArgs};
use apim_access_cli::{input, run, Engine};
use apim_access_reconcile::{RunReport, ServiceRef, ThreadSleeper};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let cli = match run::parse_args::<AssignCli>() {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    run::finish(execute(cli))
}

fn service_ref(args: &ServiceArgs) -> Result<ServiceRef> {
    ServiceRef::new(&args.subscription_id, &args.resource_group, &args.service_name)
        .context("Invalid service reference")
}

fn execute(cli: AssignCli) -> Result<RunReport> {
    let config = run::bootstrap(&cli.global)?;

    match cli.command {
        AssignCommand::Api {
            service,
            identity,
            apis_json,
        } => {
            let apis = input::parse_names(&input::read_json_arg(&apis_json)?, "API names")?;
            let service = service_ref(&service)?;
            let backend = run::arm_backend(&config, &service.subscription_id)?;
            let engine = Engine::new(backend, Arc::new(ThreadSleeper), &config);
            Ok(engine.assign_apis(&service, &identity, &apis)?)
        }
        AssignCommand::Operation {
            service,
            identity,
            api_name,
            operations_json,
        } => {
            let operations = input::parse_names(&input::read_json_arg(&operations_json)?, "operation names")?;
            let service = service_ref(&service)?;
            let backend = run::arm_backend(&config, &service.subscription_id)?;
            let engine = Engine::new(backend, Arc::new(ThreadSleeper), &config);
            Ok(engine.assign_operations(&service, &identity, &api_name, &operations)?)
        }
    }
}
