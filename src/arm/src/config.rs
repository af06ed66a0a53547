//! Endpoint and transport settings for [`ArmClient`](crate::ArmClient)

use std::time::Duration;

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Azure REST endpoints for one subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmConfig {
    /// Subscription that role definitions, assignments and locks live in
    pub subscription_id: String,

    /// Resource Manager base URL
    pub management_endpoint: String,

    /// Microsoft Graph base URL
    pub graph_endpoint: String,

    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ArmConfig {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Point the client at other clouds or at a local stub
    pub fn with_endpoints(mut self, management: impl Into<String>, graph: impl Into<String>) -> Self {
        self.management_endpoint = management.into();
        self.graph_endpoint = graph.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `/subscriptions/{id}`
    pub fn subscription_scope(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }
}
