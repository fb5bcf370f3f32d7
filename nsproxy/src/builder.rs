//! Bundle construction
//!
//! A builder produces either the source bundle itself (nothing diverges)
//! or a brand-new bundle. While members are being created they live in a
//! [`StagedMembers`] guard: if any step fails the guard is dropped and
//! every member staged so far is released, so a failed build leaves no
//! trace behind.

use crate::bundle::NsBundle;
use crate::error::NsError;
use crate::flags::CloneFlags;
use core_types::{BundleId, NamespaceKind};
use identity::UserNamespace;
use namespaces::{Namespace, NamespaceOps};
use std::sync::Arc;

/// Member construction order
///
/// Time-for-children comes before time so the active time member can be
/// taken from it.
const BUILD_ORDER: [NamespaceKind; NamespaceKind::COUNT] = [
    NamespaceKind::Mount,
    NamespaceKind::Uts,
    NamespaceKind::Ipc,
    NamespaceKind::PidForChildren,
    NamespaceKind::Net,
    NamespaceKind::TimeForChildren,
    NamespaceKind::Time,
    NamespaceKind::Cgroup,
];

/// Builds a candidate bundle from a source bundle
pub struct BundleBuilder<'a> {
    ops: &'a dyn NamespaceOps,
    source: &'a Arc<NsBundle>,
    owner: Arc<UserNamespace>,
    flags: CloneFlags,
    fork_time_fixup: bool,
    private_copy: bool,
}

impl<'a> BundleBuilder<'a> {
    /// New namespaces will be owned by `owner`
    pub fn new(
        ops: &'a dyn NamespaceOps,
        source: &'a Arc<NsBundle>,
        owner: Arc<UserNamespace>,
    ) -> Self {
        Self {
            ops,
            source,
            owner,
            flags: CloneFlags::empty(),
            fork_time_fixup: false,
            private_copy: false,
        }
    }

    /// Kinds selected by `flags` diverge; implied bits are added
    pub fn with_flags(mut self, flags: CloneFlags) -> Self {
        self.flags = flags.with_implied().namespaces();
        self
    }

    /// The new bundle runs its tasks in its own time-for-children
    /// namespace (process creation without a shared address space)
    pub fn with_fork_time_fixup(mut self, enabled: bool) -> Self {
        self.fork_time_fixup = enabled;
        self
    }

    /// Always produce a new bundle, even if nothing diverges
    pub fn with_private_copy(mut self) -> Self {
        self.private_copy = true;
        self
    }

    /// Returns true if a forked task must switch its active time
    /// namespace to `children`
    fn time_fixup_applies(&self, children: &Arc<Namespace>) -> bool {
        self.fork_time_fixup && !Arc::ptr_eq(self.source.time_ns(), children)
    }

    /// Returns true if `build` will allocate a new bundle
    pub fn needs_new_bundle(&self) -> bool {
        self.private_copy
            || self.flags.diverging_kinds().next().is_some()
            || self.time_fixup_applies(self.source.time_ns_for_children())
    }

    /// Builds the bundle
    ///
    /// When nothing diverges this is a plain share of the source bundle.
    pub fn build(self) -> Result<Arc<NsBundle>, NsError> {
        if !self.needs_new_bundle() {
            return Ok(Arc::clone(self.source));
        }

        let mut staged = StagedMembers::new(self.source.id());
        for kind in BUILD_ORDER {
            let member = self.member_for(kind, &staged)?;
            staged.put(kind, member);
        }
        let bundle = Arc::new(staged.commit()?);
        log::debug!(
            "built {} from {} (flags {:?})",
            bundle.id(),
            self.source.id(),
            self.flags
        );
        Ok(bundle)
    }

    fn member_for(
        &self,
        kind: NamespaceKind,
        staged: &StagedMembers,
    ) -> Result<Arc<Namespace>, NsError> {
        let ops = self.ops;
        let member = match kind {
            // The active time member follows the new bundle's
            // time-for-children when it diverges or the fork fixup applies.
            NamespaceKind::Time => {
                let children = staged.get(NamespaceKind::TimeForChildren).ok_or(
                    NsError::Incomplete {
                        staged: staged.staged(),
                    },
                )?;
                if self.flags.diverges(kind) || self.time_fixup_applies(children) {
                    ops.acquire(children)?
                } else {
                    ops.acquire(self.source.time_ns())?
                }
            }
            _ if self.flags.diverges(kind) => {
                ops.create_derived(self.source.member(kind), &self.owner)?
            }
            _ => ops.acquire(self.source.member(kind))?,
        };
        Ok(member)
    }
}

/// Members of a bundle under construction
///
/// Dropping the guard before [`StagedMembers::commit`] releases everything
/// staged so far.
struct StagedMembers {
    source: BundleId,
    members: [Option<Arc<Namespace>>; NamespaceKind::COUNT],
}

impl StagedMembers {
    fn new(source: BundleId) -> Self {
        Self {
            source,
            members: Default::default(),
        }
    }

    fn get(&self, kind: NamespaceKind) -> Option<&Arc<Namespace>> {
        self.members[kind.index()].as_ref()
    }

    fn put(&mut self, kind: NamespaceKind, ns: Arc<Namespace>) {
        self.members[kind.index()] = Some(ns);
    }

    fn staged(&self) -> usize {
        self.members.iter().filter(|m| m.is_some()).count()
    }

    fn commit(mut self) -> Result<NsBundle, NsError> {
        let staged = self.staged();
        match std::mem::take(&mut self.members) {
            [Some(mnt), Some(uts), Some(ipc), Some(pid), Some(net), Some(time), Some(time_for_children), Some(cgroup)] => {
                Ok(NsBundle::from_members([
                    mnt,
                    uts,
                    ipc,
                    pid,
                    net,
                    time,
                    time_for_children,
                    cgroup,
                ]))
            }
            _ => Err(NsError::Incomplete { staged }),
        }
    }
}

impl Drop for StagedMembers {
    fn drop(&mut self) {
        let staged = self.staged();
        if staged > 0 {
            log::debug!(
                "rolling back {} staged members of copy of {}",
                staged,
                self.source
            );
        }
    }
}
