//! Process creation and unshare

use crate::builder::BundleBuilder;
use crate::bundle::NsBundle;
use crate::error::NsError;
use crate::flags::CloneFlags;
use crate::staging::{FsContext, NsSet};
use identity::{CapabilitySet, Credentials};
use namespaces::NamespaceOps;
use std::sync::Arc;

/// Checks a request before anything is allocated
///
/// Flags must not conflict. Creating any namespace other than a user
/// namespace requires `SYS_ADMIN` in the requester's user namespace,
/// unless a new user namespace is created in the same request: the
/// other namespaces are then owned by it and the requester is fully
/// privileged there.
pub fn check_permissions(flags: CloneFlags, cred: &Credentials) -> Result<(), NsError> {
    flags.validate()?;
    let requested = flags.namespaces();
    if requested.contains(CloneFlags::NEWUSER) {
        return Ok(());
    }
    match requested.first_type() {
        Some(ty) if !cred.capable(CapabilitySet::SYS_ADMIN) => Err(NsError::PermissionDenied { ty }),
        _ => Ok(()),
    }
}

/// Stages credentials for a request that may create a user namespace
fn stage(
    flags: CloneFlags,
    current: &Arc<NsBundle>,
    cred: &Credentials,
    fs: &FsContext,
) -> Result<NsSet, NsError> {
    let staged = if flags.contains(CloneFlags::NEWUSER) {
        let user_ns = cred.create_user_ns()?;
        Some(cred.enter_user_ns(user_ns))
    } else {
        None
    };
    Ok(NsSet::new(flags, Arc::clone(current), fs, cred, staged))
}

/// Namespaces for a task being created from `parent`
///
/// The returned set holds either `parent` itself (nothing diverges) or a
/// new bundle, plus the child's credentials when a user namespace was
/// created. On error nothing was allocated or everything allocated was
/// released.
pub fn copy_namespaces(
    flags: CloneFlags,
    parent: &Arc<NsBundle>,
    cred: &Credentials,
    fs: &FsContext,
    ops: &dyn NamespaceOps,
) -> Result<NsSet, NsError> {
    check_permissions(flags, cred)?;
    let mut nsset = stage(flags, parent, cred, fs)?;
    let bundle = BundleBuilder::new(ops, parent, nsset.owner())
        .with_flags(flags)
        .with_fork_time_fixup(!flags.contains(CloneFlags::VM))
        .build()?;
    nsset.set_nsproxy(bundle);
    Ok(nsset)
}

/// Namespaces for a task unsharing from `current`
///
/// Returns `None` when `flags` carries no namespace bits. The task's
/// slot is not touched; pass the set to [`crate::commit_nsset`].
pub fn unshare_nsproxy_namespaces(
    flags: CloneFlags,
    current: &Arc<NsBundle>,
    cred: &Credentials,
    fs: &FsContext,
    ops: &dyn NamespaceOps,
) -> Result<Option<NsSet>, NsError> {
    flags.validate()?;
    if flags.namespaces().is_empty() {
        return Ok(None);
    }
    check_permissions(flags, cred)?;
    let mut nsset = stage(flags, current, cred, fs)?;
    let bundle = BundleBuilder::new(ops, current, nsset.owner())
        .with_flags(flags)
        .build()?;
    nsset.set_nsproxy(bundle);
    Ok(Some(nsset))
}
