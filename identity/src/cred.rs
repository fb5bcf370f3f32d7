//! Credentials and capability checks

use crate::user_ns::UserNamespace;
use crate::IdentityError;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// User ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(pub u32);

impl Uid {
    pub const ROOT: Uid = Uid(0);
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={}", self.0)
    }
}

/// Group ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gid(pub u32);

impl Gid {
    pub const ROOT: Gid = Gid(0);
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gid={}", self.0)
    }
}

bitflags! {
    /// Effective capability set
    ///
    /// Bit positions match the conventional capability numbers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilitySet: u64 {
        const CHOWN = 1 << 0;
        const DAC_OVERRIDE = 1 << 1;
        const KILL = 1 << 5;
        const SETGID = 1 << 6;
        const SETUID = 1 << 7;
        const NET_ADMIN = 1 << 12;
        const SYS_CHROOT = 1 << 18;
        const SYS_PTRACE = 1 << 19;
        const SYS_ADMIN = 1 << 21;
        const SYS_TIME = 1 << 25;
    }
}

/// Task credentials
///
/// Credentials are immutable once published to a task. Identity changes
/// build a new value (see [`Credentials::enter_user_ns`]) and swap it in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub uid: Uid,
    pub gid: Gid,
    pub euid: Uid,
    pub egid: Gid,
    pub cap_effective: CapabilitySet,
    user_ns: Arc<UserNamespace>,
}

impl Credentials {
    /// Fully privileged credentials in `user_ns`
    pub fn root(user_ns: Arc<UserNamespace>) -> Self {
        Self {
            uid: Uid::ROOT,
            gid: Gid::ROOT,
            euid: Uid::ROOT,
            egid: Gid::ROOT,
            cap_effective: CapabilitySet::all(),
            user_ns,
        }
    }

    /// Credentials with no capabilities
    pub fn unprivileged(uid: Uid, gid: Gid, user_ns: Arc<UserNamespace>) -> Self {
        Self {
            uid,
            gid,
            euid: uid,
            egid: gid,
            cap_effective: CapabilitySet::empty(),
            user_ns,
        }
    }

    /// User namespace these credentials belong to
    pub fn user_ns(&self) -> &Arc<UserNamespace> {
        &self.user_ns
    }

    /// Checks whether these credentials hold `cap` in `target`
    ///
    /// A capability is held in `target` when:
    /// - `target` is the credentials' own user namespace and `cap` is effective, or
    /// - the credentials' euid created `target` (or an ancestor of it) from
    ///   within the credentials' own user namespace.
    pub fn ns_capable(&self, target: &UserNamespace, cap: CapabilitySet) -> bool {
        let mut ns = target;
        loop {
            if std::ptr::eq(ns, self.user_ns.as_ref()) {
                return self.cap_effective.contains(cap);
            }

            // Walked above our own level without meeting it: no privilege.
            if ns.level() <= self.user_ns.level() {
                return false;
            }

            let Some(parent) = ns.parent() else {
                return false;
            };
            if Arc::ptr_eq(parent, &self.user_ns) && ns.owner() == self.euid {
                return true;
            }
            ns = parent;
        }
    }

    /// Checks `cap` in the credentials' own user namespace
    pub fn capable(&self, cap: CapabilitySet) -> bool {
        self.ns_capable(&self.user_ns, cap)
    }

    /// Creates a new user namespace owned by these credentials
    pub fn create_user_ns(&self) -> Result<Arc<UserNamespace>, IdentityError> {
        self.user_ns.create_child(self.euid, self.egid)
    }

    /// Returns credentials moved into `user_ns`
    ///
    /// The result is fully privileged inside the new user namespace.
    pub fn enter_user_ns(&self, user_ns: Arc<UserNamespace>) -> Self {
        Self {
            cap_effective: CapabilitySet::all(),
            user_ns,
            ..self.clone()
        }
    }
}
