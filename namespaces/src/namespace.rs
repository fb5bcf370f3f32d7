//! The opaque namespace object

use core_types::{NamespaceId, NamespaceType};
use identity::{NamespaceCharge, UserNamespace};
use std::fmt;
use std::sync::Arc;

/// One isolation context of one type
///
/// The kind-specific payload (mount tree, hostname, routing tables, ...)
/// is not modelled. What remains is what the bundle core relies on:
/// identity, type, ownership, lineage and the charge that is returned to
/// the owning user namespace when the last reference is dropped.
pub struct Namespace {
    id: NamespaceId,
    ty: NamespaceType,
    level: u32,
    owner: Arc<UserNamespace>,
    parent: Option<Arc<Namespace>>,
    derived_from: Option<NamespaceId>,
    charge: Option<NamespaceCharge>,
}

impl Namespace {
    /// Creates an initial (boot-time) namespace
    ///
    /// Initial namespaces are not charged against any limit.
    pub fn initial(ty: NamespaceType, owner: Arc<UserNamespace>) -> Arc<Self> {
        Arc::new(Self {
            id: NamespaceId::alloc(),
            ty,
            level: 0,
            owner,
            parent: None,
            derived_from: None,
            charge: None,
        })
    }

    pub(crate) fn charged(
        ty: NamespaceType,
        charge: NamespaceCharge,
        level: u32,
        parent: Option<Arc<Namespace>>,
        derived_from: Option<NamespaceId>,
    ) -> Arc<Self> {
        let ns = Arc::new(Self {
            id: NamespaceId::alloc(),
            ty,
            level,
            owner: Arc::clone(charge.user_ns()),
            parent,
            derived_from,
            charge: Some(charge),
        });
        log::trace!("created {} namespace {}", ns.ty, ns.id);
        ns
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    pub fn ns_type(&self) -> NamespaceType {
        self.ty
    }

    /// Nesting level for hierarchical types, 0 otherwise
    pub fn level(&self) -> u32 {
        self.level
    }

    /// User namespace that owns this namespace
    pub fn owner(&self) -> &Arc<UserNamespace> {
        &self.owner
    }

    /// Parent namespace for hierarchical types
    pub fn parent(&self) -> Option<&Arc<Namespace>> {
        self.parent.as_ref()
    }

    /// Namespace this one was copied from, if any
    pub fn derived_from(&self) -> Option<NamespaceId> {
        self.derived_from
    }

    /// Returns true for boot-time namespaces
    pub fn is_initial(&self) -> bool {
        self.charge.is_none()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("ty", &self.ty)
            .field("level", &self.level)
            .field("owner", &self.owner.id())
            .finish()
    }
}

impl Drop for Namespace {
    fn drop(&mut self) {
        log::trace!("freeing {} namespace {}", self.ty, self.id);
    }
}
