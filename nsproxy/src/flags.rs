//! Clone flags and the policy tables built on them

use crate::error::NsError;
use bitflags::bitflags;
use core_types::{NamespaceKind, NamespaceType};

bitflags! {
    /// Request flags for fork, unshare and setns
    ///
    /// Bit values match the Linux `CLONE_*` constants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CloneFlags: u64 {
        const NEWTIME = 0x0000_0080;
        const VM = 0x0000_0100;
        const FS = 0x0000_0200;
        const THREAD = 0x0001_0000;
        const NEWNS = 0x0002_0000;
        const SYSVSEM = 0x0004_0000;
        const NEWCGROUP = 0x0200_0000;
        const NEWUTS = 0x0400_0000;
        const NEWIPC = 0x0800_0000;
        const NEWUSER = 0x1000_0000;
        const NEWPID = 0x2000_0000;
        const NEWNET = 0x4000_0000;
    }
}

/// Flag that makes each bundle kind diverge
///
/// `NEWTIME` only affects future children. The active time namespace
/// diverges only alongside a new user namespace.
const KIND_FLAGS: [(NamespaceKind, CloneFlags); NamespaceKind::COUNT] = [
    (NamespaceKind::Mount, CloneFlags::NEWNS),
    (NamespaceKind::Uts, CloneFlags::NEWUTS),
    (NamespaceKind::Ipc, CloneFlags::NEWIPC),
    (NamespaceKind::PidForChildren, CloneFlags::NEWPID),
    (NamespaceKind::Net, CloneFlags::NEWNET),
    (NamespaceKind::Time, CloneFlags::NEWUSER),
    (NamespaceKind::TimeForChildren, CloneFlags::NEWTIME),
    (NamespaceKind::Cgroup, CloneFlags::NEWCGROUP),
];

/// A new user namespace gets its own network and time namespaces
const IMPLIED_FLAGS: [(CloneFlags, CloneFlags); 1] = [(
    CloneFlags::NEWUSER,
    CloneFlags::NEWNET.union(CloneFlags::NEWTIME),
)];

/// Pairs that may not be requested together
const CONFLICTING_FLAGS: [(CloneFlags, CloneFlags, &str); 4] = [
    (
        CloneFlags::NEWIPC,
        CloneFlags::SYSVSEM,
        "a new IPC namespace cannot share SysV semaphores",
    ),
    (
        CloneFlags::NEWUSER,
        CloneFlags::FS,
        "a new user namespace cannot share filesystem state",
    ),
    (
        CloneFlags::NEWUSER,
        CloneFlags::THREAD,
        "threads cannot be in different user namespaces",
    ),
    (
        CloneFlags::NEWPID,
        CloneFlags::THREAD,
        "threads cannot be in different PID namespaces",
    ),
];

impl CloneFlags {
    /// Every namespace-creation bit, user included
    pub const NAMESPACES: CloneFlags = CloneFlags::NEWNS
        .union(CloneFlags::NEWUTS)
        .union(CloneFlags::NEWIPC)
        .union(CloneFlags::NEWPID)
        .union(CloneFlags::NEWNET)
        .union(CloneFlags::NEWTIME)
        .union(CloneFlags::NEWCGROUP)
        .union(CloneFlags::NEWUSER);

    /// Flag that makes `kind` diverge
    pub fn for_kind(kind: NamespaceKind) -> CloneFlags {
        KIND_FLAGS[kind.index()].1
    }

    /// Flag that selects namespaces of type `ty`
    pub fn for_type(ty: NamespaceType) -> CloneFlags {
        match ty {
            NamespaceType::User => CloneFlags::NEWUSER,
            NamespaceType::Mount => CloneFlags::NEWNS,
            NamespaceType::Uts => CloneFlags::NEWUTS,
            NamespaceType::Ipc => CloneFlags::NEWIPC,
            NamespaceType::Pid => CloneFlags::NEWPID,
            NamespaceType::Net => CloneFlags::NEWNET,
            NamespaceType::Time => CloneFlags::NEWTIME,
            NamespaceType::Cgroup => CloneFlags::NEWCGROUP,
        }
    }

    /// Rejects conflicting combinations
    pub fn validate(self) -> Result<(), NsError> {
        for (a, b, reason) in CONFLICTING_FLAGS {
            if self.contains(a) && self.contains(b) {
                return Err(NsError::InvalidFlags {
                    flags: self,
                    reason,
                });
            }
        }
        Ok(())
    }

    /// Adds the bits implied by the bits already set
    pub fn with_implied(self) -> CloneFlags {
        IMPLIED_FLAGS
            .iter()
            .filter(|(trigger, _)| self.contains(*trigger))
            .fold(self, |acc, (_, implied)| acc | *implied)
    }

    /// Namespace bits only
    pub fn namespaces(self) -> CloneFlags {
        self & CloneFlags::NAMESPACES
    }

    /// Returns true if `kind` diverges under these flags
    pub fn diverges(self, kind: NamespaceKind) -> bool {
        self.intersects(Self::for_kind(kind))
    }

    /// Kinds that diverge under these flags, in bundle order
    pub fn diverging_kinds(self) -> impl Iterator<Item = NamespaceKind> {
        NamespaceKind::ALL
            .into_iter()
            .filter(move |kind| self.diverges(*kind))
    }

    /// First namespace type selected by these flags, user first
    pub fn first_type(self) -> Option<NamespaceType> {
        NamespaceType::ALL
            .into_iter()
            .find(|ty| self.contains(Self::for_type(*ty)))
    }
}
