//! Simulated tasks

use core_types::TaskId;
use identity::Credentials;
use nsproxy::{FsContext, NsBundle, NsSlot};
use spin::{Mutex, MutexGuard, RwLock};
use std::sync::Arc;

/// A simulated task
///
/// Credentials and the fs context are replaced whole, never edited in
/// place. The namespace slot follows the bundle access rules: only the
/// task itself switches it, others inspect it under its lock.
pub struct Task {
    id: TaskId,
    parent: Option<TaskId>,
    cred: RwLock<Arc<Credentials>>,
    fs: Mutex<FsContext>,
    nsproxy: NsSlot,
    /// Held while the task acts on itself
    running: Mutex<()>,
}

impl Task {
    pub(crate) fn new(
        id: TaskId,
        parent: Option<TaskId>,
        cred: Arc<Credentials>,
        fs: FsContext,
        bundle: Arc<NsBundle>,
    ) -> Self {
        Self {
            id,
            parent,
            cred: RwLock::new(cred),
            fs: Mutex::new(fs),
            nsproxy: NsSlot::new(bundle),
            running: Mutex::new(()),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn cred(&self) -> Arc<Credentials> {
        self.cred.read().clone()
    }

    pub fn fs(&self) -> FsContext {
        self.fs.lock().clone()
    }

    pub fn nsproxy(&self) -> &NsSlot {
        &self.nsproxy
    }

    /// Returns true once the task's namespaces are torn down
    pub fn has_exited(&self) -> bool {
        self.nsproxy.is_torn_down()
    }

    pub(crate) fn set_cred(&self, cred: Arc<Credentials>) {
        *self.cred.write() = cred;
    }

    pub(crate) fn set_fs(&self, fs: FsContext) {
        *self.fs.lock() = fs;
    }

    /// Makes the calling thread act as this task until the guard drops
    pub(crate) fn run(&self) -> MutexGuard<'_, ()> {
        self.running.lock()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("nsproxy", &self.nsproxy)
            .finish()
    }
}
