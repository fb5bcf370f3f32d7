//! # Identity
//!
//! This crate provides the identity primitives the namespace core needs:
//! user namespaces, credentials and capability checks.
//!
//! ## Philosophy
//!
//! - **Identity is contextual**: a capability is always held *in* some user namespace
//! - **Ownership flows downward**: the owner of a user namespace is fully
//!   privileged inside it and everything nested below it
//! - **Credentials are values**: changing identity means staging a new
//!   `Credentials` value, never editing a shared one
//!
//! ## Core Concepts
//!
//! - `UserNamespace`: Identity boundary; owns every other namespace and their counters
//! - `NamespaceCharge`: RAII charge against a user namespace chain
//! - `Credentials`: uid/gid, effective capabilities and the user namespace they live in
//! - `CapabilitySet`: Privileges checked with [`Credentials::ns_capable`]
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - uid/gid mapping tables
//! - Keyrings, security modules or auditing
//! - Login or authentication

pub mod cred;
pub mod user_ns;

pub use cred::{CapabilitySet, Credentials, Gid, Uid};
pub use user_ns::{init_user_ns, NamespaceCharge, UserNamespace};

use core_types::NamespaceId;
use resources::ResourceError;
use thiserror::Error;

/// Identity-related errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Already a member of user namespace {0}")]
    SameUserNamespace(NamespaceId),
}
