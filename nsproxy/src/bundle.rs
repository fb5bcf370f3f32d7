//! The namespace bundle

use core_types::{BundleId, NamespaceKind, NamespaceType};
use identity::UserNamespace;
use namespaces::Namespace;
use std::fmt;
use std::sync::Arc;

/// One namespace per [`NamespaceKind`], shared by every task whose
/// namespaces are all identical
///
/// A bundle is reference counted through `Arc`. Members are only replaced
/// while the bundle is still private to whoever is building it
/// (`Arc::get_mut`); a published bundle is never edited.
pub struct NsBundle {
    id: BundleId,
    members: [Arc<Namespace>; NamespaceKind::COUNT],
}

impl NsBundle {
    pub(crate) fn from_members(members: [Arc<Namespace>; NamespaceKind::COUNT]) -> Self {
        Self {
            id: BundleId::alloc(),
            members,
        }
    }

    /// Builds the boot-time bundle: one initial namespace per type, owned
    /// by `owner`. Time and time-for-children are the same namespace.
    pub fn initial(owner: &Arc<UserNamespace>) -> Arc<Self> {
        let time = Namespace::initial(NamespaceType::Time, Arc::clone(owner));
        let members = NamespaceKind::ALL.map(|kind| match kind {
            NamespaceKind::Time | NamespaceKind::TimeForChildren => Arc::clone(&time),
            other => Namespace::initial(other.ns_type(), Arc::clone(owner)),
        });
        Arc::new(Self::from_members(members))
    }

    pub fn id(&self) -> BundleId {
        self.id
    }

    /// Member at `kind`
    pub fn member(&self, kind: NamespaceKind) -> &Arc<Namespace> {
        &self.members[kind.index()]
    }

    /// Members with their kinds, in bundle order
    pub fn members(&self) -> impl Iterator<Item = (NamespaceKind, &Arc<Namespace>)> {
        NamespaceKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.member(kind)))
    }

    pub fn mnt_ns(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::Mount)
    }

    pub fn uts_ns(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::Uts)
    }

    pub fn ipc_ns(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::Ipc)
    }

    pub fn pid_ns_for_children(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::PidForChildren)
    }

    pub fn net_ns(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::Net)
    }

    pub fn time_ns(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::Time)
    }

    pub fn time_ns_for_children(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::TimeForChildren)
    }

    pub fn cgroup_ns(&self) -> &Arc<Namespace> {
        self.member(NamespaceKind::Cgroup)
    }

    /// Returns true if both bundles hold the same instance at `kind`
    pub fn shares_with(&self, other: &NsBundle, kind: NamespaceKind) -> bool {
        Arc::ptr_eq(self.member(kind), other.member(kind))
    }

    /// Current number of holders of `bundle`
    pub fn refcount(bundle: &Arc<Self>) -> usize {
        Arc::strong_count(bundle)
    }

    /// Replaces one member, returning the old one
    ///
    /// Callers reach this only through `Arc::get_mut`, so the bundle has a
    /// single holder.
    pub(crate) fn replace_member(
        &mut self,
        kind: NamespaceKind,
        ns: Arc<Namespace>,
    ) -> Arc<Namespace> {
        std::mem::replace(&mut self.members[kind.index()], ns)
    }
}

impl fmt::Debug for NsBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("NsBundle");
        dbg.field("id", &self.id);
        for (kind, ns) in self.members() {
            dbg.field(kind.name(), &ns.id());
        }
        dbg.finish()
    }
}

impl fmt::Display for NsBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Drop for NsBundle {
    fn drop(&mut self) {
        log::debug!("freeing {}", self.id);
    }
}
