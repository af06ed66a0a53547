//! Hierarchical resource scopes
//!
//! Builds service, API and operation scopes for one API Management
//! instance and confirms that each target exists before it is used as an
//! assignable scope.
//!
//! # Examples
//!
//! ```
//! use apim_access_reconcile::scope::ServiceRef;
//!
//! let service = ServiceRef::new("sub-1", "rg-apis", "contoso-apim").unwrap();
//! let op = service.operation_scope("orders", "get-order").unwrap();
//! assert!(op.is_within(service.scope().as_str()));
//! assert_eq!(op.parent().unwrap(), service.api_scope("orders").unwrap());
//! ```

mod types;
mod builder;

#[cfg(test)]
mod tests;

pub use types::{is_within, ResourceScope, ScopeError, ScopeLevel, ScopeResult, ServiceRef};
pub use builder::{ScopeBuilder, TargetScopes};
