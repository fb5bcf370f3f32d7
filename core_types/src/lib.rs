//! # Core Types
//!
//! This crate defines the fundamental types shared by every namespace crate.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Namespace kinds are typed and cannot be confused.
//! - **Type safety first**: Task, namespace and bundle identifiers are distinct types.
//! - **No ambient state**: Identifiers carry no authority by themselves.
//!
//! ## Key Types
//!
//! - [`TaskId`]: Unique identifier for tasks
//! - [`NamespaceId`]: Unique identifier for namespace instances
//! - [`BundleId`]: Unique identifier for namespace bundles
//! - [`NamespaceType`]: Type of a namespace object
//! - [`NamespaceKind`]: Member position inside a namespace bundle

pub mod ids;
pub mod kind;

pub use ids::{BundleId, NamespaceId, TaskId};
pub use kind::{NamespaceKind, NamespaceType};
