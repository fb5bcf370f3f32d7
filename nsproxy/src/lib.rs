//! # NsProxy
//!
//! Per-task namespace bundles: how they are shared, when they are copied,
//! and how a task's bundle is swapped, inspected and torn down.
//!
//! ## Philosophy
//!
//! - **Share by default**: tasks that diverge in nothing share one bundle
//! - **Copy on divergence**: a shared bundle is never edited; any change
//!   produces a new bundle object
//! - **All or nothing**: a bundle under construction is either complete or
//!   leaves no reference behind
//! - **Lock protects the pointer, the count protects the object**
//!
//! ## Core Concepts
//!
//! - [`NsBundle`]: exactly one namespace per [`NamespaceKind`], shared through `Arc`
//! - [`BundleBuilder`]: builds a candidate bundle from a source bundle and flags
//! - [`NsSet`]: staging object for one request (flags, candidate, fs, credentials)
//! - [`NsSlot`]: a task's lock-guarded reference to its bundle
//! - [`CloneFlags`]: which kinds diverge, with explicit implication and conflict tables
//!
//! ## Access Rules
//!
//! 1. Only the owning task changes its slot, and only while holding the slot lock.
//! 2. The owner reads its own slot freely.
//! 3. Any other task reads a slot only under that slot's lock. An empty
//!    slot means the task is exiting and is not inspectable.
//!
//! [`NamespaceKind`]: core_types::NamespaceKind

pub mod builder;
pub mod bundle;
pub mod copy;
pub mod error;
pub mod flags;
pub mod init;
pub mod setns;
pub mod slot;
pub mod staging;

pub use builder::BundleBuilder;
pub use bundle::NsBundle;
pub use copy::{check_permissions, copy_namespaces, unshare_nsproxy_namespaces};
pub use error::{NsError, NsErrorKind};
pub use flags::CloneFlags;
pub use init::init_nsproxy;
pub use setns::prepare_nsset;
pub use slot::{exit_task_namespaces, switch_task_namespaces, NsSlot};
pub use staging::{commit_nsset, Committed, FsContext, NsSet};
