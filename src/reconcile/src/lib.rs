//! # APIM Access Reconcile
//!
//! Idempotent reconciliation of least-privilege API Management roles
//! against an eventually consistent authorization backend.
//!
//! ## Provisioning
//!
//! ```text
//! IdentityResolver -> ScopeBuilder -> RoleDefinitionSynthesizer -> AssignmentReconciler
//! ```
//!
//! ## Removal
//!
//! ```text
//! IdentityResolver -> TeardownReconciler
//! ```
//!
//! [`LockSnapshotManager`] is independent of both paths and lifts resource
//! group locks around mutating steps.
//!
//! Every loop is sequential and every wait is a blocking sleep through a
//! [`Sleeper`]. Each reconciler returns a [`RunReport`]; only authorization
//! failures, identity resolution failures, an empty target set and exhausted
//! retries on a sole unit of work surface as [`ReconcileError`].

pub mod error;
pub mod retry;
pub mod outcome;
pub mod identity;
pub mod scope;
pub mod definition;
pub mod assignment;
pub mod teardown;
pub mod locks;

// Re-export commonly used types
pub use error::{ReconcileError, Result};
pub use retry::{Backoff, RecordingSleeper, RetryOutcome, RetryPolicy, Sleeper, Step, ThreadSleeper};
pub use outcome::{OutcomeStatus, ReportSummary, RunReport, UnitOutcome};
pub use identity::{IdentityResolver, Resolution};
pub use scope::{ResourceScope, ScopeBuilder, ScopeLevel, ServiceRef, TargetScopes};
pub use definition::{
    ConflictWarning, DefinitionIntent, DefinitionOutcome, RoleDefinitionSynthesizer, RoleNamer,
    Synthesis, SynthesizerSettings,
};
pub use assignment::{AssignmentReconciler, AssignmentSettings, DEFAULT_READER_ROLE};
pub use teardown::{TeardownReconciler, TeardownSettings};
pub use locks::LockSnapshotManager;
