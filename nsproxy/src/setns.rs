//! Entering existing namespaces
//!
//! `prepare_nsset` gives the caller a private copy of its bundle. Each
//! namespace to enter is installed into that copy; nothing is visible
//! until [`crate::commit_nsset`]. A failed install drops the whole set.

use crate::builder::BundleBuilder;
use crate::bundle::NsBundle;
use crate::error::NsError;
use crate::flags::CloneFlags;
use crate::staging::{FsContext, NsSet};
use core_types::{NamespaceKind, NamespaceType};
use identity::{CapabilitySet, Credentials, IdentityError, UserNamespace};
use namespaces::{Namespace, NamespaceOps};
use std::sync::Arc;

/// Starts a setns request for the namespace types in `flags`
pub fn prepare_nsset(
    flags: CloneFlags,
    current: &Arc<NsBundle>,
    cred: &Credentials,
    fs: &FsContext,
    ops: &dyn NamespaceOps,
) -> Result<NsSet, NsError> {
    flags.validate()?;
    if flags.is_empty() || flags != flags.namespaces() {
        return Err(NsError::InvalidFlags {
            flags,
            reason: "setns takes namespace bits only",
        });
    }
    let candidate = BundleBuilder::new(ops, current, Arc::clone(cred.user_ns()))
        .with_private_copy()
        .build()?;
    let staged = flags.contains(CloneFlags::NEWUSER).then(|| cred.clone());
    Ok(NsSet::new(flags, candidate, fs, cred, staged))
}

/// Bundle position a namespace of type `ty` is installed into
///
/// PID and time namespaces only take effect for children.
fn install_kind(ty: NamespaceType) -> Option<NamespaceKind> {
    match ty {
        NamespaceType::Mount => Some(NamespaceKind::Mount),
        NamespaceType::Uts => Some(NamespaceKind::Uts),
        NamespaceType::Ipc => Some(NamespaceKind::Ipc),
        NamespaceType::Pid => Some(NamespaceKind::PidForChildren),
        NamespaceType::Net => Some(NamespaceKind::Net),
        NamespaceType::Time => Some(NamespaceKind::TimeForChildren),
        NamespaceType::Cgroup => Some(NamespaceKind::Cgroup),
        NamespaceType::User => None,
    }
}

fn required_caps(ty: NamespaceType) -> CapabilitySet {
    match ty {
        NamespaceType::Mount => CapabilitySet::SYS_ADMIN | CapabilitySet::SYS_CHROOT,
        _ => CapabilitySet::SYS_ADMIN,
    }
}

impl NsSet {
    /// Installs `ns` into the candidate bundle
    ///
    /// Requires `SYS_ADMIN` over the namespace's owner and in the
    /// request's own user namespace. Entering a mount namespace resets
    /// root and cwd to its `/`.
    pub fn install(&mut self, ns: &Arc<Namespace>, ops: &dyn NamespaceOps) -> Result<(), NsError> {
        let ty = ns.ns_type();
        let kind = install_kind(ty).ok_or(NsError::NotInstallable { ty })?;
        if !self.flags().contains(CloneFlags::for_type(ty)) {
            return Err(NsError::NotInstallable { ty });
        }

        let cred = self.effective_cred();
        let caps = required_caps(ty);
        if !cred.ns_capable(ns.owner(), CapabilitySet::SYS_ADMIN) || !cred.capable(caps) {
            return Err(NsError::PermissionDenied { ty });
        }

        let member = ops.acquire(ns)?;
        let bundle = self.nsproxy_mut().ok_or(NsError::NotInstallable { ty })?;
        let old = bundle.replace_member(kind, member);
        log::debug!("setns: {} {} -> {}", kind, old.id(), ns.id());
        drop(old);

        if ty == NamespaceType::Mount {
            self.reset_fs(ns);
        }
        Ok(())
    }

    /// Moves the staged credentials into `user_ns`
    ///
    /// Must come before other installs of the same request: they are
    /// checked against the staged credentials.
    pub fn install_user_ns(&mut self, user_ns: &Arc<UserNamespace>) -> Result<(), NsError> {
        if !self.flags().contains(CloneFlags::NEWUSER) {
            return Err(NsError::NotInstallable {
                ty: NamespaceType::User,
            });
        }
        let requester = self.requester();
        if Arc::ptr_eq(user_ns, requester.user_ns()) {
            return Err(IdentityError::SameUserNamespace(user_ns.id()).into());
        }
        if !requester.ns_capable(user_ns, CapabilitySet::SYS_ADMIN) {
            return Err(NsError::PermissionDenied {
                ty: NamespaceType::User,
            });
        }
        let entered = requester.enter_user_ns(Arc::clone(user_ns));
        log::debug!("setns: user {} -> {}", requester.user_ns().id(), user_ns.id());
        self.set_cred(entered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::NsSlot;
    use crate::staging::commit_nsset;
    use identity::{Gid, Uid};
    use namespaces::StandardNamespaces;
    use resources::NamespaceLimits;

    struct Fixture {
        owner: Arc<UserNamespace>,
        bundle: Arc<NsBundle>,
        root: Credentials,
        fs: FsContext,
    }

    fn fixture() -> Fixture {
        let owner = UserNamespace::new_root(NamespaceLimits::default());
        let bundle = NsBundle::initial(&owner);
        let fs = FsContext::new(bundle.mnt_ns()).with_cwd("/tmp");
        Fixture {
            root: Credentials::root(Arc::clone(&owner)),
            owner,
            bundle,
            fs,
        }
    }

    fn other_ns(f: &Fixture, ty: NamespaceType) -> Arc<Namespace> {
        StandardNamespaces.create_fresh(ty, &f.owner).unwrap()
    }

    #[test]
    fn test_prepare_makes_private_copy() {
        let f = fixture();
        let set = prepare_nsset(
            CloneFlags::NEWNET,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        assert!(!Arc::ptr_eq(set.nsproxy(), &f.bundle));
        assert_eq!(NsBundle::refcount(set.nsproxy()), 1);
        assert!(set.cred().is_none());
    }

    #[test]
    fn test_prepare_rejects_non_namespace_flags() {
        let f = fixture();
        for flags in [CloneFlags::empty(), CloneFlags::NEWNET | CloneFlags::VM] {
            let err = prepare_nsset(flags, &f.bundle, &f.root, &f.fs, &StandardNamespaces)
                .unwrap_err();
            assert!(matches!(err, NsError::InvalidFlags { .. }));
        }
    }

    #[test]
    fn test_install_net_and_commit() {
        let f = fixture();
        let slot = NsSlot::new(Arc::clone(&f.bundle));
        let net = other_ns(&f, NamespaceType::Net);
        let mut set = prepare_nsset(
            CloneFlags::NEWNET,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        set.install(&net, &StandardNamespaces).unwrap();
        commit_nsset(&slot, set).unwrap();

        let current = slot.current().unwrap();
        assert!(Arc::ptr_eq(current.net_ns(), &net));
        assert!(current.shares_with(&f.bundle, NamespaceKind::Uts));
        assert!(!f.bundle.shares_with(&current, NamespaceKind::Net));
    }

    #[test]
    fn test_install_pid_and_time_only_for_children() {
        let f = fixture();
        let pid = other_ns(&f, NamespaceType::Pid);
        let time = other_ns(&f, NamespaceType::Time);
        let mut set = prepare_nsset(
            CloneFlags::NEWPID | CloneFlags::NEWTIME,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        set.install(&pid, &StandardNamespaces).unwrap();
        set.install(&time, &StandardNamespaces).unwrap();

        let candidate = set.nsproxy();
        assert!(Arc::ptr_eq(candidate.pid_ns_for_children(), &pid));
        assert!(Arc::ptr_eq(candidate.time_ns_for_children(), &time));
        assert!(Arc::ptr_eq(candidate.time_ns(), f.bundle.time_ns()));
    }

    #[test]
    fn test_install_mount_resets_fs() {
        let f = fixture();
        let mnt = other_ns(&f, NamespaceType::Mount);
        let mut set = prepare_nsset(
            CloneFlags::NEWNS,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        set.install(&mnt, &StandardNamespaces).unwrap();
        assert_eq!(set.fs().mount_ns, mnt.id());
        assert_eq!(set.fs().cwd, "/");
    }

    #[test]
    fn test_install_type_not_requested() {
        let f = fixture();
        let uts = other_ns(&f, NamespaceType::Uts);
        let mut set = prepare_nsset(
            CloneFlags::NEWNET,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        let err = set.install(&uts, &StandardNamespaces).unwrap_err();
        assert_eq!(err, NsError::NotInstallable { ty: NamespaceType::Uts });
    }

    #[test]
    fn test_unprivileged_install_denied() {
        let f = fixture();
        let user = Credentials::unprivileged(Uid(1000), Gid(1000), Arc::clone(&f.owner));
        let ipc = other_ns(&f, NamespaceType::Ipc);
        let mut set = prepare_nsset(
            CloneFlags::NEWIPC,
            &f.bundle,
            &user,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        let err = set.install(&ipc, &StandardNamespaces).unwrap_err();
        assert_eq!(err, NsError::PermissionDenied { ty: NamespaceType::Ipc });
        assert!(Arc::ptr_eq(set.nsproxy().ipc_ns(), f.bundle.ipc_ns()));
    }

    #[test]
    fn test_enter_own_user_ns_then_namespace() {
        let f = fixture();
        let user = Credentials::unprivileged(Uid(1000), Gid(1000), Arc::clone(&f.owner));
        let child_ns = user.create_user_ns().unwrap();
        let uts = StandardNamespaces
            .create_fresh(NamespaceType::Uts, &child_ns)
            .unwrap();

        let mut set = prepare_nsset(
            CloneFlags::NEWUSER | CloneFlags::NEWUTS,
            &f.bundle,
            &user,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        set.install_user_ns(&child_ns).unwrap();
        set.install(&uts, &StandardNamespaces).unwrap();

        let (bundle, cred, _) = set.into_parts();
        assert!(Arc::ptr_eq(cred.unwrap().user_ns(), &child_ns));
        assert!(Arc::ptr_eq(bundle.uts_ns(), &uts));
    }

    #[test]
    fn test_enter_same_user_ns_rejected() {
        let f = fixture();
        let mut set = prepare_nsset(
            CloneFlags::NEWUSER,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        let err = set.install_user_ns(&f.owner).unwrap_err();
        assert_eq!(
            err,
            NsError::Identity(IdentityError::SameUserNamespace(f.owner.id()))
        );
    }

    #[test]
    fn test_enter_foreign_user_ns_denied() {
        let f = fixture();
        let alice = Credentials::unprivileged(Uid(1000), Gid(1000), Arc::clone(&f.owner));
        let bob = Credentials::unprivileged(Uid(1001), Gid(1001), Arc::clone(&f.owner));
        let bobs_ns = bob.create_user_ns().unwrap();

        let mut set = prepare_nsset(
            CloneFlags::NEWUSER,
            &f.bundle,
            &alice,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        let err = set.install_user_ns(&bobs_ns).unwrap_err();
        assert_eq!(err, NsError::PermissionDenied { ty: NamespaceType::User });
        assert!(Arc::ptr_eq(set.cred().unwrap().user_ns(), &f.owner));
    }

    #[test]
    fn test_dropped_set_releases_installed_members() {
        let f = fixture();
        let net = other_ns(&f, NamespaceType::Net);
        let mut set = prepare_nsset(
            CloneFlags::NEWNET,
            &f.bundle,
            &f.root,
            &f.fs,
            &StandardNamespaces,
        )
        .unwrap();
        set.install(&net, &StandardNamespaces).unwrap();
        assert_eq!(Arc::strong_count(&net), 2);
        drop(set);
        assert_eq!(Arc::strong_count(&net), 1);
        assert_eq!(Arc::strong_count(f.bundle.net_ns()), 1);
    }
}
