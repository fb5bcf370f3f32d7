//! A task's reference to its bundle
//!
//! The slot lock guards the *pointer*, not the bundle: it is held only
//! long enough to read or swap the reference. Dropping the old bundle
//! happens after the lock is released.

use crate::bundle::NsBundle;
use core_types::NamespaceKind;
use namespaces::Namespace;
use spin::Mutex;
use std::sync::Arc;

/// Lock-guarded bundle reference of one task
///
/// `None` means the task has torn down its namespaces and is exiting.
pub struct NsSlot {
    nsproxy: Mutex<Option<Arc<NsBundle>>>,
}

impl NsSlot {
    pub fn new(bundle: Arc<NsBundle>) -> Self {
        Self {
            nsproxy: Mutex::new(Some(bundle)),
        }
    }

    /// The owner's view of its own bundle
    ///
    /// Only the owner switches its own slot, so the value cannot change
    /// under this read. The lock is taken only because there is no
    /// lock-free way to clone an `Arc` out of a shared `Option`.
    pub fn current(&self) -> Option<Arc<NsBundle>> {
        self.nsproxy.lock().clone()
    }

    /// Replaces the bundle with `new`, releasing the old one
    ///
    /// Returns false, and releases `new`, if the slot was already torn
    /// down.
    pub fn switch(&self, new: Arc<NsBundle>) -> bool {
        let new_id = new.id();
        let old = {
            let mut slot = self.nsproxy.lock();
            match slot.as_mut() {
                Some(current) => Ok(std::mem::replace(current, new)),
                None => Err(new),
            }
        };
        match old {
            Ok(old) => {
                if old.id() != new_id {
                    log::trace!("switched {} -> {}", old.id(), new_id);
                }
                true
            }
            Err(rejected) => {
                log::warn!("switch to {} on a torn-down slot", rejected.id());
                false
            }
        }
    }

    /// Clears the slot, releasing the bundle
    ///
    /// Returns false if the slot was already empty.
    pub fn teardown(&self) -> bool {
        let old = self.nsproxy.lock().take();
        match old {
            Some(bundle) => {
                log::trace!("tearing down {}", bundle.id());
                true
            }
            None => {
                log::warn!("namespace teardown on an already empty slot");
                false
            }
        }
    }

    /// Another task's view: a counted reference taken under the lock
    pub fn inspect(&self) -> Option<Arc<NsBundle>> {
        self.nsproxy.lock().as_ref().map(Arc::clone)
    }

    /// Runs `f` on the bundle while holding the slot lock
    ///
    /// The bundle cannot be released while `f` runs. Keep `f` short.
    pub fn with_bundle<R>(&self, f: impl FnOnce(&NsBundle) -> R) -> Option<R> {
        let slot = self.nsproxy.lock();
        slot.as_deref().map(f)
    }

    /// Takes a reference to one member of another task's bundle
    pub fn inspect_member(&self, kind: NamespaceKind) -> Option<Arc<Namespace>> {
        self.with_bundle(|bundle| Arc::clone(bundle.member(kind)))
    }

    pub fn is_torn_down(&self) -> bool {
        self.nsproxy.lock().is_none()
    }
}

impl std::fmt::Debug for NsSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.nsproxy.lock().as_ref().map(|b| b.id());
        f.debug_struct("NsSlot").field("nsproxy", &id).finish()
    }
}

/// Switches `slot` to `new`
pub fn switch_task_namespaces(slot: &NsSlot, new: Arc<NsBundle>) -> bool {
    slot.switch(new)
}

/// Tears down the namespaces of an exiting task
pub fn exit_task_namespaces(slot: &NsSlot) -> bool {
    slot.teardown()
}
