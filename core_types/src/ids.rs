//! Task, namespace and bundle identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Unique identifier for a task
///
/// Tasks are individual units of execution. Every task owns exactly one
/// namespace slot for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocates a random task ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell tasks apart in logs.
        let simple = self.0.simple().to_string();
        write!(f, "task:{}", &simple[..8])
    }
}

/// First dynamically allocated namespace number.
///
/// Matches the inode range used for namespace files, so numbers look
/// familiar when printed next to real ones.
const NAMESPACE_ID_BASE: u64 = 0xF000_0000;

static NEXT_NAMESPACE_ID: AtomicU64 = AtomicU64::new(NAMESPACE_ID_BASE);
static NEXT_BUNDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a namespace instance
///
/// Namespace IDs are allocated from a process-wide counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NamespaceId(u64);

impl NamespaceId {
    /// Allocates a fresh namespace ID
    pub fn alloc() -> Self {
        Self(NEXT_NAMESPACE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw number
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

/// Identifier of a namespace bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BundleId(u64);

impl BundleId {
    /// Allocates a fresh bundle ID
    pub fn alloc() -> Self {
        Self(NEXT_BUNDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw number
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nsproxy#{}", self.0)
    }
}
