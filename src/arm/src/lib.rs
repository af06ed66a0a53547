//! # APIM Access ARM
//!
//! Authorization API client backed by the Azure Resource Manager and
//! Microsoft Graph REST APIs.
//!
//! [`ArmClient`] implements [`DirectoryClient`](apim_access_core::DirectoryClient),
//! [`RoleClient`](apim_access_core::RoleClient) and
//! [`LockClient`](apim_access_core::LockClient) with blocking HTTP calls.
//! Every non-success response is classified into a
//! [`BackendError`](apim_access_core::BackendError) so the reconcilers can
//! decide between abort, retry and per-unit failure.
//!
//! Bearer tokens are not acquired here. A [`TokenSource`] supplies them;
//! [`EnvToken`] reads a pre-acquired token from the environment.

pub mod client;
pub mod config;
pub mod error;
pub mod token;
pub mod wire;

// Re-export commonly used types
pub use client::ArmClient;
pub use config::ArmConfig;
pub use error::{classify, ArmError, Result};
pub use token::{EnvToken, StaticToken, TokenSource};
