//! Shared fixtures for reconciliation integration tests

#![allow(dead_code)]

use apim_access_core::InMemoryBackend;
use apim_access_reconcile::{
    AssignmentReconciler, AssignmentSettings, IdentityResolver, RecordingSleeper, RetryPolicy,
    RoleDefinitionSynthesizer, ScopeBuilder, ServiceRef, SynthesizerSettings, TeardownReconciler,
    TeardownSettings, DEFAULT_READER_ROLE,
};
use std::sync::Arc;
use std::time::Duration;

pub const SUB: &str = "sub-1";
pub const RG: &str = "rg-apis";
pub const SVC: &str = "contoso";
pub const READER_ID: &str = "rd-reader";

pub fn service() -> ServiceRef {
    ServiceRef::new(SUB, RG, SVC).unwrap()
}

pub fn api_path(api: &str) -> String {
    service().api_scope(api).unwrap().to_string()
}

pub fn operation_path(api: &str, op: &str) -> String {
    service().operation_scope(api, op).unwrap().to_string()
}

/// A tenant with one user, one group, the reader role and a few APIs
pub fn tenant() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_user("u-alice", "alice@contoso.com")
        .with_user("u-bob", "bob@contoso.com")
        .with_group("g-editors", "api-editors")
        .with_builtin_role(READER_ID, DEFAULT_READER_ROLE)
        .with_resource(&service().scope().to_string())
        .with_resource(&api_path("orders"))
        .with_resource(&api_path("billing"))
        .with_resource(&operation_path("orders", "op1"))
}

/// Every engine component wired to one backend and a recording sleeper
pub struct Engine {
    pub backend: Arc<InMemoryBackend>,
    pub sleeper: Arc<RecordingSleeper>,
    pub resolver: IdentityResolver,
    pub scopes: ScopeBuilder,
    pub synthesizer: RoleDefinitionSynthesizer,
    pub assignments: AssignmentReconciler,
    pub teardown: TeardownReconciler,
}

pub fn engine(backend: InMemoryBackend) -> Engine {
    let backend = Arc::new(backend);
    let sleeper = Arc::new(RecordingSleeper::new());
    let wait = Duration::from_secs(10);

    Engine {
        resolver: IdentityResolver::new(backend.clone()),
        scopes: ScopeBuilder::new(backend.clone()),
        synthesizer: RoleDefinitionSynthesizer::new(
            backend.clone(),
            sleeper.clone(),
            SynthesizerSettings {
                apply_policy: RetryPolicy::new(3, wait),
                ..SynthesizerSettings::default()
            },
        ),
        assignments: AssignmentReconciler::new(
            backend.clone(),
            sleeper.clone(),
            AssignmentSettings {
                create_policy: RetryPolicy::new(3, wait),
                verify_policy: RetryPolicy::new(3, wait),
                reader_role_name: DEFAULT_READER_ROLE.to_string(),
            },
        ),
        teardown: TeardownReconciler::new(
            backend.clone(),
            sleeper.clone(),
            TeardownSettings {
                settle: Duration::from_secs(30),
                delete_policy: RetryPolicy::fixed(3, Duration::from_secs(30)),
            },
        ),
        backend,
        sleeper,
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
