//! Per-request staging
//!
//! An [`NsSet`] carries everything one fork, unshare or setns request is
//! about to change: the flags, the candidate bundle, the filesystem
//! context and, only when a new identity is involved, a credential
//! override. Nothing in it is visible to other tasks until
//! [`commit_nsset`] publishes it.

use crate::bundle::NsBundle;
use crate::flags::CloneFlags;
use crate::slot::NsSlot;
use core_types::{NamespaceId, NamespaceKind};
use identity::{Credentials, UserNamespace};
use namespaces::Namespace;
use std::fmt;
use std::sync::Arc;

/// Filesystem root and working directory of a task
///
/// Paths are resolved inside `mount_ns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsContext {
    pub root: String,
    pub cwd: String,
    pub mount_ns: NamespaceId,
}

impl FsContext {
    /// Root and cwd at `/` of `mount_ns`
    pub fn new(mount_ns: &Namespace) -> Self {
        Self {
            root: "/".to_string(),
            cwd: "/".to_string(),
            mount_ns: mount_ns.id(),
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }
}

impl fmt::Display for FsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root={} cwd={} mnt={}", self.root, self.cwd, self.mount_ns)
    }
}

/// Staging object for one namespace request
pub struct NsSet {
    flags: CloneFlags,
    nsproxy: Arc<NsBundle>,
    fs: FsContext,
    requester: Credentials,
    cred: Option<Credentials>,
}

impl NsSet {
    /// `cred` is kept only if `flags` contains `NEWUSER`
    pub(crate) fn new(
        flags: CloneFlags,
        nsproxy: Arc<NsBundle>,
        fs: &FsContext,
        requester: &Credentials,
        cred: Option<Credentials>,
    ) -> Self {
        Self {
            flags,
            nsproxy,
            fs: fs.clone(),
            requester: requester.clone(),
            cred: cred.filter(|_| flags.contains(CloneFlags::NEWUSER)),
        }
    }

    pub fn flags(&self) -> CloneFlags {
        self.flags
    }

    /// The candidate bundle
    pub fn nsproxy(&self) -> &Arc<NsBundle> {
        &self.nsproxy
    }

    pub fn fs(&self) -> &FsContext {
        &self.fs
    }

    /// Staged credentials; `None` unless the request creates or enters a
    /// user namespace
    pub fn cred(&self) -> Option<&Credentials> {
        if self.flags.contains(CloneFlags::NEWUSER) {
            self.cred.as_ref()
        } else {
            None
        }
    }

    /// Mutable staged credentials, under the same rule as [`NsSet::cred`]
    pub fn cred_mut(&mut self) -> Option<&mut Credentials> {
        if self.flags.contains(CloneFlags::NEWUSER) {
            self.cred.as_mut()
        } else {
            None
        }
    }

    /// Credentials the request acts with: the staged ones if present,
    /// the requester's otherwise
    pub fn effective_cred(&self) -> &Credentials {
        self.cred().unwrap_or(&self.requester)
    }

    pub(crate) fn requester(&self) -> &Credentials {
        &self.requester
    }

    /// User namespace that owns namespaces created for this request
    pub(crate) fn owner(&self) -> Arc<UserNamespace> {
        Arc::clone(self.effective_cred().user_ns())
    }

    pub(crate) fn set_cred(&mut self, cred: Credentials) {
        if self.flags.contains(CloneFlags::NEWUSER) {
            self.cred = Some(cred);
        }
    }

    /// Replaces the candidate; a changed mount namespace moves the
    /// filesystem context along with it
    pub(crate) fn set_nsproxy(&mut self, nsproxy: Arc<NsBundle>) {
        let mount = nsproxy.mnt_ns();
        if mount.id() != self.fs.mount_ns && mount.derived_from() == Some(self.fs.mount_ns) {
            self.fs.mount_ns = mount.id();
        }
        self.nsproxy = nsproxy;
    }

    /// Candidate bundle for in-place edits; `None` once it is shared
    pub(crate) fn nsproxy_mut(&mut self) -> Option<&mut NsBundle> {
        Arc::get_mut(&mut self.nsproxy)
    }

    pub(crate) fn reset_fs(&mut self, mount_ns: &Namespace) {
        self.fs = FsContext::new(mount_ns);
    }

    /// Returns true if the candidate differs from `bundle` at `kind`
    pub fn changes(&self, bundle: &NsBundle, kind: NamespaceKind) -> bool {
        !self.nsproxy.shares_with(bundle, kind)
    }

    pub fn into_parts(self) -> (Arc<NsBundle>, Option<Credentials>, FsContext) {
        let cred = if self.flags.contains(CloneFlags::NEWUSER) {
            self.cred
        } else {
            None
        };
        (self.nsproxy, cred, self.fs)
    }
}

impl fmt::Debug for NsSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NsSet")
            .field("flags", &self.flags)
            .field("nsproxy", &self.nsproxy.id())
            .field("fs", &self.fs)
            .field("cred", &self.cred().map(|c| c.user_ns().id()))
            .finish()
    }
}

/// What the caller still has to publish after a commit
#[derive(Debug)]
pub struct Committed {
    /// New credentials, when the request changed identity
    pub cred: Option<Credentials>,
    pub fs: FsContext,
}

/// Installs the candidate bundle into `slot`
///
/// Returns `None` if the slot was already torn down; the candidate is
/// released in that case.
pub fn commit_nsset(slot: &NsSlot, nsset: NsSet) -> Option<Committed> {
    let (nsproxy, cred, fs) = nsset.into_parts();
    if !slot.switch(nsproxy) {
        return None;
    }
    Some(Committed { cred, fs })
}
