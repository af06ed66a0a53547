//! Command-line surfaces of the four tools

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Flags every tool accepts
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "APIM_ACCESS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOperation {
    /// Print the group's locks as a JSON array
    Identify,
    /// Delete the group's locks
    Remove,
}

/// Capture or lift the administrative locks on a resource group
#[derive(Parser, Debug)]
#[command(name = "apim-locks", version)]
pub struct LocksCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subscription holding the resource group
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    pub operation: LockOperation,

    pub resource_group: String,

    /// Locks to remove (JSON or @file); the group's current locks otherwise
    pub locks_json: Option<String>,
}

/// Recreate locks captured by `apim-locks identify`
#[derive(Parser, Debug)]
#[command(name = "apim-locks-restore", version)]
pub struct RestoreCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    pub resource_group: String,

    /// Lock snapshot (JSON or @file)
    pub locks_json: String,
}

/// Grant least-privilege access to an API Management service
#[derive(Parser, Debug)]
#[command(name = "apim-assign", version)]
pub struct AssignCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: AssignCommand,
}

/// Identifies the target service instance
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

#[derive(Subcommand, Debug)]
pub enum AssignCommand {
    /// Grant access to whole APIs
    Api {
        #[command(flatten)]
        service: ServiceArgs,

        /// User principal name or group display name
        identity: String,

        /// API names (JSON array or @file)
        apis_json: String,
    },

    /// Grant access to individual operations of one API
    Operation {
        #[command(flatten)]
        service: ServiceArgs,

        /// User principal name or group display name
        identity: String,

        api_name: String,

        /// Operation names (JSON array or @file)
        operations_json: String,
    },
}

/// Remove access granted by `apim-assign`
#[derive(Parser, Debug)]
#[command(name = "apim-unassign", version)]
pub struct UnassignCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subscription holding the role definitions
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription: Option<String>,

    /// User principal name or group display name
    pub identity: String,

    /// Role names or role definition objects (JSON or @file)
    pub roles_json: String,
}
