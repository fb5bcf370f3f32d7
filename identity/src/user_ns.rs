//! User namespaces and namespace charging

use crate::cred::{Gid, Uid};
use crate::IdentityError;
use core_types::{NamespaceId, NamespaceType};
use resources::{NamespaceCounts, NamespaceLimits, ResourceError, MAX_NAMESPACE_LEVEL};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// An identity boundary
///
/// Every other namespace is owned by exactly one user namespace, and every
/// user namespace except the root holds a reference to its parent. The
/// per-type counters of all namespaces created under it live here.
pub struct UserNamespace {
    id: NamespaceId,
    level: u32,
    owner: Uid,
    group: Gid,
    parent: Option<Arc<UserNamespace>>,
    counts: NamespaceCounts,
    /// Charge for this namespace in the parent chain, released on drop
    _charge: Option<NamespaceCharge>,
}

impl UserNamespace {
    /// Creates a root user namespace with the given limits
    pub fn new_root(limits: NamespaceLimits) -> Arc<Self> {
        Arc::new(Self {
            id: NamespaceId::alloc(),
            level: 0,
            owner: Uid::ROOT,
            group: Gid::ROOT,
            parent: None,
            counts: NamespaceCounts::new(limits),
            _charge: None,
        })
    }

    /// Creates a child user namespace owned by `owner`
    ///
    /// The child starts with a copy of this namespace's limits. Its creation
    /// is charged here and in every ancestor.
    pub fn create_child(
        self: &Arc<Self>,
        owner: Uid,
        group: Gid,
    ) -> Result<Arc<Self>, IdentityError> {
        if self.level >= MAX_NAMESPACE_LEVEL {
            return Err(ResourceError::NestingTooDeep {
                ty: NamespaceType::User,
                max: MAX_NAMESPACE_LEVEL,
            }
            .into());
        }

        let charge = NamespaceCharge::acquire(self, NamespaceType::User)?;
        let child = Arc::new(Self {
            id: NamespaceId::alloc(),
            level: self.level + 1,
            owner,
            group,
            parent: Some(Arc::clone(self)),
            counts: NamespaceCounts::new(self.counts.limits()),
            _charge: Some(charge),
        });
        log::trace!("created user namespace {} at level {}", child.id, child.level);
        Ok(child)
    }

    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Nesting level (root = 0)
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Effective uid of the creator
    pub fn owner(&self) -> Uid {
        self.owner
    }

    pub fn group(&self) -> Gid {
        self.group
    }

    pub fn parent(&self) -> Option<&Arc<UserNamespace>> {
        self.parent.as_ref()
    }

    /// Live counters and limits of namespaces owned at this level
    pub fn counts(&self) -> &NamespaceCounts {
        &self.counts
    }

    /// Returns true if `self` is `other` or one of its ancestors
    pub fn is_same_or_ancestor_of(&self, other: &UserNamespace) -> bool {
        let mut current = Some(other);
        while let Some(ns) = current {
            if ns.level < self.level {
                return false;
            }
            if std::ptr::eq(ns, self) {
                return true;
            }
            current = ns.parent.as_deref();
        }
        false
    }
}

impl fmt::Debug for UserNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserNamespace")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("owner", &self.owner)
            .finish()
    }
}

impl Drop for UserNamespace {
    fn drop(&mut self) {
        log::trace!("freeing user namespace {}", self.id);
    }
}

/// A charge of one namespace against a user namespace chain
///
/// Acquiring increments the counter for the type in the user namespace and
/// in every ancestor; dropping decrements all of them again.
pub struct NamespaceCharge {
    user_ns: Arc<UserNamespace>,
    ty: NamespaceType,
}

impl NamespaceCharge {
    /// Charges `ty` against `user_ns` and its ancestors
    ///
    /// If any level is at its limit, the levels already charged are
    /// released before the error is returned.
    pub fn acquire(user_ns: &Arc<UserNamespace>, ty: NamespaceType) -> Result<Self, ResourceError> {
        let mut charged: Vec<&UserNamespace> = Vec::new();
        let mut current = Some(user_ns.as_ref());
        while let Some(ns) = current {
            if let Err(err) = ns.counts.try_charge(ty) {
                for level in charged {
                    level.counts.uncharge(ty);
                }
                return Err(err);
            }
            charged.push(ns);
            current = ns.parent.as_deref();
        }

        Ok(Self {
            user_ns: Arc::clone(user_ns),
            ty,
        })
    }

    pub fn user_ns(&self) -> &Arc<UserNamespace> {
        &self.user_ns
    }

    pub fn ty(&self) -> NamespaceType {
        self.ty
    }
}

impl fmt::Debug for NamespaceCharge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceCharge")
            .field("user_ns", &self.user_ns.id)
            .field("ty", &self.ty)
            .finish()
    }
}

impl Drop for NamespaceCharge {
    fn drop(&mut self) {
        let mut current = Some(self.user_ns.as_ref());
        while let Some(ns) = current {
            ns.counts.uncharge(self.ty);
            current = ns.parent.as_deref();
        }
    }
}

static INIT_USER_NS: OnceLock<Arc<UserNamespace>> = OnceLock::new();

/// The initial user namespace
///
/// Created on first use with default limits and never freed.
pub fn init_user_ns() -> &'static Arc<UserNamespace> {
    INIT_USER_NS.get_or_init(|| UserNamespace::new_root(NamespaceLimits::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Arc<UserNamespace> {
        UserNamespace::new_root(NamespaceLimits::default())
    }

    #[test]
    fn test_root_namespace() {
        let ns = root();
        assert_eq!(ns.level(), 0);
        assert!(ns.parent().is_none());
        assert_eq!(ns.owner(), Uid::ROOT);
        assert!(ns.counts().is_idle());
    }

    #[test]
    fn test_child_charges_parent() {
        let ns = root();
        let child = ns.create_child(Uid(1000), Gid(1000)).unwrap();
        assert_eq!(child.level(), 1);
        assert_eq!(child.owner(), Uid(1000));
        assert_eq!(ns.counts().count(NamespaceType::User), 1);

        drop(child);
        assert_eq!(ns.counts().count(NamespaceType::User), 0);
    }

    #[test]
    fn test_grandchild_charges_whole_chain() {
        let ns = root();
        let child = ns.create_child(Uid(1000), Gid(1000)).unwrap();
        let grandchild = child.create_child(Uid(1000), Gid(1000)).unwrap();

        assert_eq!(ns.counts().count(NamespaceType::User), 2);
        assert_eq!(child.counts().count(NamespaceType::User), 1);

        drop(child);
        // The grandchild keeps its parent alive.
        assert_eq!(ns.counts().count(NamespaceType::User), 2);
        drop(grandchild);
        assert_eq!(ns.counts().count(NamespaceType::User), 0);
    }

    #[test]
    fn test_ancestor_limit_caps_descendants() {
        let ns = UserNamespace::new_root(
            NamespaceLimits::unlimited().with_limit(NamespaceType::Net, 1),
        );
        let child = ns.create_child(Uid(1), Gid(1)).unwrap();
        child.counts().set_limit(NamespaceType::Net, 10);

        let first = NamespaceCharge::acquire(&child, NamespaceType::Net).unwrap();
        let second = NamespaceCharge::acquire(&child, NamespaceType::Net);
        assert!(matches!(
            second,
            Err(ResourceError::LimitExceeded {
                ty: NamespaceType::Net,
                limit: 1
            })
        ));
        // The failed attempt must not leave a charge behind at the child level.
        assert_eq!(child.counts().count(NamespaceType::Net), 1);

        drop(first);
        assert!(child.counts().is_idle());
        assert_eq!(ns.counts().count(NamespaceType::Net), 0);
    }

    #[test]
    fn test_nesting_limit() {
        let mut ns = root();
        let mut chain = Vec::new();
        for _ in 0..MAX_NAMESPACE_LEVEL {
            let child = ns.create_child(Uid(1), Gid(1)).unwrap();
            chain.push(Arc::clone(&child));
            ns = child;
        }
        assert_eq!(ns.level(), MAX_NAMESPACE_LEVEL);
        let err = ns.create_child(Uid(1), Gid(1)).unwrap_err();
        assert_eq!(
            err,
            IdentityError::Resource(ResourceError::NestingTooDeep {
                ty: NamespaceType::User,
                max: MAX_NAMESPACE_LEVEL
            })
        );
    }

    #[test]
    fn test_ancestry() {
        let ns = root();
        let child = ns.create_child(Uid(1), Gid(1)).unwrap();
        let other = root();

        assert!(ns.is_same_or_ancestor_of(&child));
        assert!(ns.is_same_or_ancestor_of(&ns));
        assert!(!child.is_same_or_ancestor_of(&ns));
        assert!(!other.is_same_or_ancestor_of(&child));
    }

    #[test]
    fn test_init_user_ns_is_singleton() {
        assert!(Arc::ptr_eq(init_user_ns(), init_user_ns()));
        assert_eq!(init_user_ns().level(), 0);
    }
}
