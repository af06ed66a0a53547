//! Tool configuration loading and validation

use anyhow::{Context, Result};
use apim_access_arm::ArmConfig;
use apim_access_reconcile::definition::RoleNamer;
use apim_access_reconcile::{
    AssignmentSettings, RetryPolicy, SynthesizerSettings, TeardownSettings, DEFAULT_READER_ROLE,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for any configured wait
pub const MAX_WAIT_SECS: u64 = 3600;

/// Complete tool configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub azure: AzureSection,

    #[serde(default)]
    pub roles: RolesSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySection {
    #[serde(default = "default_assignment_attempts")]
    pub assignment_attempts: u32,
    #[serde(default = "default_base_wait")]
    pub assignment_base_wait_secs: u64,
    #[serde(default = "default_verification_polls")]
    pub verification_polls: u32,
    #[serde(default = "default_base_wait")]
    pub verification_base_wait_secs: u64,
    #[serde(default = "default_definition_attempts")]
    pub definition_attempts: u32,
    #[serde(default = "default_base_wait")]
    pub definition_base_wait_secs: u64,
    #[serde(default = "default_teardown_wait")]
    pub teardown_settle_secs: u64,
    #[serde(default = "default_teardown_attempts")]
    pub teardown_attempts: u32,
    #[serde(default = "default_teardown_wait")]
    pub teardown_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AzureSection {
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    #[serde(default = "default_graph_endpoint")]
    pub graph_endpoint: String,
    /// Subscription for tools that take none on the command line
    #[serde(default)]
    pub default_subscription: Option<String>,
    #[serde(default = "default_arm_token_env")]
    pub arm_token_env: String,
    #[serde(default = "default_graph_token_env")]
    pub graph_token_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RolesSection {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_reader_role")]
    pub reader_role_name: String,
    #[serde(default = "default_conflict_markers")]
    pub conflict_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            assignment_attempts: default_assignment_attempts(),
            assignment_base_wait_secs: default_base_wait(),
            verification_polls: default_verification_polls(),
            verification_base_wait_secs: default_base_wait(),
            definition_attempts: default_definition_attempts(),
            definition_base_wait_secs: default_base_wait(),
            teardown_settle_secs: default_teardown_wait(),
            teardown_attempts: default_teardown_attempts(),
            teardown_wait_secs: default_teardown_wait(),
        }
    }
}

impl Default for AzureSection {
    fn default() -> Self {
        Self {
            management_endpoint: default_management_endpoint(),
            graph_endpoint: default_graph_endpoint(),
            default_subscription: None,
            arm_token_env: default_arm_token_env(),
            graph_token_env: default_graph_token_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for RolesSection {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            reader_role_name: default_reader_role(),
            conflict_markers: default_conflict_markers(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_assignment_attempts() -> u32 { 5 }
fn default_verification_polls() -> u32 { 6 }
fn default_definition_attempts() -> u32 { 5 }
fn default_teardown_attempts() -> u32 { 6 }
fn default_base_wait() -> u64 { 10 }
fn default_teardown_wait() -> u64 { 30 }
fn default_management_endpoint() -> String { apim_access_arm::config::DEFAULT_MANAGEMENT_ENDPOINT.to_string() }
fn default_graph_endpoint() -> String { apim_access_arm::config::DEFAULT_GRAPH_ENDPOINT.to_string() }
fn default_arm_token_env() -> String { "AZURE_ARM_TOKEN".to_string() }
fn default_graph_token_env() -> String { "AZURE_GRAPH_TOKEN".to_string() }
fn default_request_timeout() -> u64 { 60 }
fn default_name_prefix() -> String { "APIM".to_string() }
fn default_reader_role() -> String { DEFAULT_READER_ROLE.to_string() }
fn default_conflict_markers() -> Vec<String> {
    apim_access_reconcile::definition::DEFAULT_CONFLICT_MARKERS
        .iter()
        .map(|m| m.to_string())
        .collect()
}
fn default_log_level() -> String { "info".to_string() }

impl AccessConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        let config: AccessConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, built-in defaults otherwise; validated
    /// either way
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let retry = &self.retry;
        for (name, value) in [
            ("retry.assignment_attempts", retry.assignment_attempts),
            ("retry.verification_polls", retry.verification_polls),
            ("retry.definition_attempts", retry.definition_attempts),
            ("retry.teardown_attempts", retry.teardown_attempts),
        ] {
            if value < 1 {
                anyhow::bail!("{} must be at least 1", name);
            }
        }

        for (name, value) in [
            ("retry.assignment_base_wait_secs", retry.assignment_base_wait_secs),
            ("retry.verification_base_wait_secs", retry.verification_base_wait_secs),
            ("retry.definition_base_wait_secs", retry.definition_base_wait_secs),
            ("retry.teardown_settle_secs", retry.teardown_settle_secs),
            ("retry.teardown_wait_secs", retry.teardown_wait_secs),
        ] {
            if value > MAX_WAIT_SECS {
                anyhow::bail!("{} must be at most {} seconds", name, MAX_WAIT_SECS);
            }
        }

        if self.azure.request_timeout_secs == 0 {
            anyhow::bail!("azure.request_timeout_secs must be greater than 0");
        }

        for (name, url) in [
            ("azure.management_endpoint", &self.azure.management_endpoint),
            ("azure.graph_endpoint", &self.azure.graph_endpoint),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                anyhow::bail!("{} must be an http(s) URL, got '{}'", name, url);
            }
        }

        if self.roles.reader_role_name.trim().is_empty() {
            anyhow::bail!("roles.reader_role_name must not be empty");
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            anyhow::bail!("logging.level must be one of trace, debug, info, warn, error");
        }

        Ok(())
    }

    pub fn assignment_settings(&self) -> AssignmentSettings {
        AssignmentSettings {
            create_policy: RetryPolicy::new(
                self.retry.assignment_attempts,
                Duration::from_secs(self.retry.assignment_base_wait_secs),
            ),
            verify_policy: RetryPolicy::new(
                self.retry.verification_polls,
                Duration::from_secs(self.retry.verification_base_wait_secs),
            ),
            reader_role_name: self.roles.reader_role_name.clone(),
        }
    }

    pub fn synthesizer_settings(&self) -> SynthesizerSettings {
        SynthesizerSettings {
            namer: RoleNamer::new(self.roles.name_prefix.as_str()),
            conflict_markers: self.roles.conflict_markers.clone(),
            apply_policy: RetryPolicy::new(
                self.retry.definition_attempts,
                Duration::from_secs(self.retry.definition_base_wait_secs),
            ),
        }
    }

    pub fn teardown_settings(&self) -> TeardownSettings {
        TeardownSettings {
            settle: Duration::from_secs(self.retry.teardown_settle_secs),
            delete_policy: RetryPolicy::fixed(
                self.retry.teardown_attempts,
                Duration::from_secs(self.retry.teardown_wait_secs),
            ),
        }
    }

    /// REST client settings for one subscription
    pub fn arm_config(&self, subscription_id: &str) -> ArmConfig {
        ArmConfig::new(subscription_id)
            .with_endpoints(self.azure.management_endpoint.as_str(), self.azure.graph_endpoint.as_str())
            .with_timeout(Duration::from_secs(self.azure.request_timeout_secs))
    }

    /// The explicit subscription, else the configured default
    pub fn subscription(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.azure.default_subscription.clone())
            .filter(|s| !s.trim().is_empty())
            .context("No subscription given: pass --subscription or set azure.default_subscription")
    }
}
