//! Least-privilege role definition synthesis
//!
//! A role's name is derived from the principal's confirmed kind, its display
//! name and the resource it covers. The name is the lookup key: a run either
//! creates the role or updates the one an earlier run created.

mod naming;
mod permissions;
mod synthesizer;


pub use naming::{normalize, RoleNamer, DEFAULT_PREFIX};
pub use permissions::{allow_list, check_boundary, deny_list, PermissionSet};
pub use synthesizer::{
    merge_scopes, ConflictWarning, DefinitionIntent, DefinitionOutcome, RoleDefinitionSynthesizer,
    Synthesis, SynthesizerSettings, DEFAULT_CONFLICT_MARKERS,
};
