//! Namespace audit trail
//!
//! Records what the simulated kernel did to task bundles, in order, so
//! tests can assert on it.
//!
//! ## Philosophy
//!
//! - Test-only: This is NOT production logging, it's for test verification
//! - Ordered: every event gets a sequence number, even across threads
//! - Queryable: Tests can assert on the trail to verify sharing and teardown

use core_types::{BundleId, TaskId};
use serde::{Deserialize, Serialize};
use spin::Mutex;

/// Operation a refusal applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NsOperation {
    Spawn,
    Unshare,
    Setns,
    Exit,
}

/// Something the kernel did to a task's bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NsEvent {
    /// A task was created; `shared` when it got its parent's bundle
    Spawned {
        parent: TaskId,
        child: TaskId,
        bundle: BundleId,
        shared: bool,
    },

    /// A task replaced its bundle by unsharing
    Unshared {
        task: TaskId,
        from: BundleId,
        to: BundleId,
    },

    /// A task entered namespaces of another task
    Entered {
        task: TaskId,
        target: TaskId,
        from: BundleId,
        to: BundleId,
    },

    /// A task tore down its bundle
    Exited { task: TaskId, bundle: BundleId },

    /// A request failed and changed nothing
    Refused {
        task: TaskId,
        operation: NsOperation,
        reason: String,
    },
}

impl NsEvent {
    /// Task the event is about
    pub fn task(&self) -> TaskId {
        match self {
            NsEvent::Spawned { child, .. } => *child,
            NsEvent::Unshared { task, .. }
            | NsEvent::Entered { task, .. }
            | NsEvent::Exited { task, .. }
            | NsEvent::Refused { task, .. } => *task,
        }
    }
}

/// A single audit event with its sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsAuditEvent {
    pub seq: u64,
    pub event: NsEvent,
}

#[derive(Debug, Default)]
struct AuditState {
    next_seq: u64,
    events: Vec<NsAuditEvent>,
}

/// Audit log for namespace operations
#[derive(Debug, Default)]
pub struct NsAuditLog {
    state: Mutex<AuditState>,
}

impl NsAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event, returning its sequence number
    pub fn record(&self, event: NsEvent) -> u64 {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.events.push(NsAuditEvent { seq, event });
        seq
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<NsAuditEvent> {
        self.state.lock().events.clone()
    }

    /// Events about `task`
    pub fn events_for_task(&self, task: TaskId) -> Vec<NsAuditEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.event.task() == task)
            .cloned()
            .collect()
    }

    /// Counts events matching the predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&NsEvent) -> bool,
    {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| predicate(&e.event))
            .count()
    }

    /// Checks if any event matches the predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&NsEvent) -> bool,
    {
        self.state.lock().events.iter().any(|e| predicate(&e.event))
    }

    /// Clears all events; sequence numbers keep counting
    pub fn clear(&self) {
        self.state.lock().events.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }
}
