//! # Namespaces
//!
//! Opaque, reference-counted namespace objects and the operations the
//! bundle core is allowed to perform on them.
//!
//! ## Philosophy
//!
//! - **Opaque**: the core never looks at kind-specific state
//! - **Counted**: a namespace is an `Arc<Namespace>`; cloning acquires,
//!   dropping releases, the last drop destroys it and returns its charge
//! - **One seam**: everything that creates namespaces goes through
//!   [`NamespaceOps`], so tests can substitute failing implementations
//!
//! ## Core Concepts
//!
//! - `Namespace`: one isolation context of one type
//! - `NamespaceOps`: create-fresh, create-derived and acquire
//! - `Derivation`: how each type derives a new instance from an existing one
//! - `StandardNamespaces`: the default implementation, charging the owning user namespace

pub mod error;
pub mod namespace;
pub mod ops;

pub use error::NamespaceError;
pub use namespace::Namespace;
pub use ops::{Derivation, NamespaceOps, StandardNamespaces};
