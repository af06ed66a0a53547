//! # APIM Access CLI
//!
//! Configuration, logging and the pipelines behind the command-line tools:
//!
//! - `apim-locks identify|remove <group> [locks]`
//! - `apim-locks-restore <group> <locks>`
//! - `apim-assign api|operation ...`
//! - `apim-unassign <identity> <roles>`
//!
//! Each tool exits 0 when every unit of work succeeded (warnings allowed)
//! and 1 on bad usage, a fatal error or any failed unit.

pub mod args;
pub mod config;
pub mod input;
pub mod logging;
pub mod pipeline;
pub mod run;

// Re-export commonly used types
pub use config::AccessConfig;
pub use pipeline::Engine;
