//! Logging bootstrap shared by every tool
//!
//! Logs go to stderr so that JSON written to stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

const CRATES: &[&str] = &[
    "apim_access_core",
    "apim_access_reconcile",
    "apim_access_arm",
    "apim_access_cli",
];

/// Filter directive used when `RUST_LOG` is not set. Dependencies stay at
/// `warn`; the workspace crates log at `level`.
pub fn default_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    let mut directive = String::from("warn");
    for krate in CRATES {
        directive.push_str(&format!(",{}={}", krate, level));
    }
    directive
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level; a second call is a no-op.
pub fn init(level: &str, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level, verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
}
