use super::*;
use crate::error::ReconcileError;
use crate::outcome::{OutcomeStatus, RunReport};
use apim_access_core::{BackendError, Granularity, InMemoryBackend, Operation};
use std::sync::Arc;

const SERVICE: &str =
    "/subscriptions/sub-1/resourceGroups/rg-apis/providers/Microsoft.ApiManagement/service/contoso";

fn service() -> ServiceRef {
    ServiceRef::new("sub-1", "rg-apis", "contoso").unwrap()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn builder(backend: InMemoryBackend) -> (ScopeBuilder, Arc<InMemoryBackend>) {
    let backend = Arc::new(backend);
    (ScopeBuilder::new(backend.clone()), backend)
}

#[test]
fn test_scope_paths() {
    let service = service();
    assert_eq!(service.scope().as_str(), SERVICE);
    assert_eq!(service.scope().level(), ScopeLevel::Service);

    let api = service.api_scope("orders").unwrap();
    assert_eq!(api.as_str(), format!("{}/apis/orders", SERVICE));
    assert_eq!(api.level(), ScopeLevel::Api);

    let op = service.operation_scope("orders", "get-order").unwrap();
    assert_eq!(op.as_str(), format!("{}/apis/orders/operations/get-order", SERVICE));
    assert_eq!(op.level(), ScopeLevel::Operation);
}

#[test]
fn test_parent_chain() {
    let op = service().operation_scope("orders", "get-order").unwrap();
    let api = op.parent().unwrap();
    assert_eq!(api.level(), ScopeLevel::Api);
    let svc = api.parent().unwrap();
    assert_eq!(svc, service().scope());
    assert!(svc.parent().is_none());
}

#[test]
fn test_is_within_is_case_insensitive_and_segment_aware() {
    let api = service().api_scope("orders").unwrap();
    assert!(api.is_within(&SERVICE.to_uppercase()));
    assert!(api.is_within(api.as_str()));
    assert!(!api.is_within(&format!("{}/apis/ord", SERVICE)));
    assert!(!service().scope().is_within(api.as_str()));
}

#[test]
fn test_invalid_segments_rejected() {
    assert_eq!(
        service().api_scope("  ").unwrap_err(),
        ScopeError::EmptySegment("API name")
    );
    assert!(matches!(
        service().api_scope("orders/../../x"),
        Err(ScopeError::InvalidSegment { .. })
    ));
    assert!(ServiceRef::new("sub-1", "", "svc").is_err());
}

#[test]
fn test_api_scopes_drop_missing_targets() {
    let (builder, _) = builder(InMemoryBackend::new().with_resource(&format!("{}/apis/orders", SERVICE)));
    let mut report = RunReport::new();

    let targets = builder
        .api_scopes(&service(), &names(&["orders", "billing"]), &mut report)
        .unwrap();

    assert_eq!(targets.granularity, Granularity::Api);
    assert_eq!(targets.resource_name, "contoso");
    assert_eq!(targets.paths(), vec![format!("{}/apis/orders", SERVICE)]);
    assert_eq!(targets.dropped.len(), 1);
    assert_eq!(targets.dropped[0].0, "billing");
    assert!(matches!(report.status_of("target billing"), Some(OutcomeStatus::Warning(_))));
    assert!(!report.has_failures());
}

#[test]
fn test_duplicate_names_probed_once() {
    let (builder, backend) = builder(InMemoryBackend::new().with_resource(&format!("{}/apis/orders", SERVICE)));
    let mut report = RunReport::new();

    let targets = builder
        .api_scopes(&service(), &names(&["orders", "Orders", " orders "]), &mut report)
        .unwrap();

    assert_eq!(targets.scopes.len(), 1);
    assert_eq!(backend.call_count(Operation::ResourceExists), 1);
}

#[test]
fn test_empty_result_is_scope_validation_error() {
    let (builder, _) = builder(InMemoryBackend::new());
    let mut report = RunReport::new();

    let err = builder
        .api_scopes(&service(), &names(&["ghost"]), &mut report)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::ScopeValidation(_)));
}

#[test]
fn test_probe_error_drops_target_but_authorization_is_fatal() {
    let backend = InMemoryBackend::new()
        .with_resource(&format!("{}/apis/orders", SERVICE))
        .with_resource(&format!("{}/apis/billing", SERVICE));
    let (builder, backend) = builder(backend);
    backend.inject_fault(Operation::ResourceExists, BackendError::transient("throttled"));

    let mut report = RunReport::new();
    let targets = builder
        .api_scopes(&service(), &names(&["orders", "billing"]), &mut report)
        .unwrap();
    assert_eq!(targets.paths(), vec![format!("{}/apis/billing", SERVICE)]);

    backend.inject_fault(Operation::ResourceExists, BackendError::denied("no read"));
    let err = builder
        .api_scopes(&service(), &names(&["orders"]), &mut report)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::Authorization(_)));
}

#[test]
fn test_operation_scopes_keep_only_existing_operations() {
    let backend = InMemoryBackend::new()
        .with_resource(&format!("{}/apis/orders", SERVICE))
        .with_resource(&format!("{}/apis/orders/operations/op1", SERVICE));
    let (builder, _) = builder(backend);
    let mut report = RunReport::new();

    let targets = builder
        .operation_scopes(&service(), "orders", &names(&["op1", "op2"]), &mut report)
        .unwrap();

    assert_eq!(targets.granularity, Granularity::Operation);
    assert_eq!(targets.resource_name, "contoso.orders");
    assert_eq!(
        targets.paths(),
        vec![format!("{}/apis/orders/operations/op1", SERVICE)]
    );
}

#[test]
fn test_operation_scopes_require_parent_api() {
    let backend = InMemoryBackend::new().with_resource(&format!("{}/apis/orders/operations/op1", SERVICE));
    let (builder, backend) = builder(backend);
    let mut report = RunReport::new();

    let err = builder
        .operation_scopes(&service(), "orders", &names(&["op1"]), &mut report)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::ScopeValidation(_)));
    // Only the parent was probed
    assert_eq!(backend.call_count(Operation::ResourceExists), 1);
}
