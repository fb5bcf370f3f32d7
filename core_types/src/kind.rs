//! Namespace types and bundle member kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a namespace object
///
/// This is what a namespace *is*. Limits and counters are kept per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamespaceType {
    /// Identity (user) namespace
    User,
    /// Mount table view
    Mount,
    /// Host identity (hostname, domain name)
    Uts,
    /// Inter-process communication objects
    Ipc,
    /// Process-ID space
    Pid,
    /// Network stack
    Net,
    /// Clock offsets
    Time,
    /// Resource-control grouping
    Cgroup,
}

impl NamespaceType {
    /// Number of namespace types
    pub const COUNT: usize = 8;

    /// Every namespace type, in counter order
    pub const ALL: [NamespaceType; Self::COUNT] = [
        NamespaceType::User,
        NamespaceType::Mount,
        NamespaceType::Uts,
        NamespaceType::Ipc,
        NamespaceType::Pid,
        NamespaceType::Net,
        NamespaceType::Time,
        NamespaceType::Cgroup,
    ];

    /// Dense index, used for per-type counter arrays
    pub fn index(self) -> usize {
        match self {
            NamespaceType::User => 0,
            NamespaceType::Mount => 1,
            NamespaceType::Uts => 2,
            NamespaceType::Ipc => 3,
            NamespaceType::Pid => 4,
            NamespaceType::Net => 5,
            NamespaceType::Time => 6,
            NamespaceType::Cgroup => 7,
        }
    }

    /// Short name as shown in namespace file names
    pub fn name(self) -> &'static str {
        match self {
            NamespaceType::User => "user",
            NamespaceType::Mount => "mnt",
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::Pid => "pid",
            NamespaceType::Net => "net",
            NamespaceType::Time => "time",
            NamespaceType::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Member position inside a namespace bundle
///
/// A bundle holds exactly one namespace per kind. Two kinds can refer to
/// the same namespace type: `Time` and `TimeForChildren` both hold time
/// namespaces, and the active PID namespace is not a bundle member at all
/// (only the one children will be created in).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamespaceKind {
    Mount,
    Uts,
    Ipc,
    PidForChildren,
    Net,
    Time,
    TimeForChildren,
    Cgroup,
}

impl NamespaceKind {
    /// Number of bundle members
    pub const COUNT: usize = 8;

    /// Every bundle member, in construction order
    pub const ALL: [NamespaceKind; Self::COUNT] = [
        NamespaceKind::Mount,
        NamespaceKind::Uts,
        NamespaceKind::Ipc,
        NamespaceKind::PidForChildren,
        NamespaceKind::Net,
        NamespaceKind::Time,
        NamespaceKind::TimeForChildren,
        NamespaceKind::Cgroup,
    ];

    /// Dense index into bundle member arrays
    pub fn index(self) -> usize {
        match self {
            NamespaceKind::Mount => 0,
            NamespaceKind::Uts => 1,
            NamespaceKind::Ipc => 2,
            NamespaceKind::PidForChildren => 3,
            NamespaceKind::Net => 4,
            NamespaceKind::Time => 5,
            NamespaceKind::TimeForChildren => 6,
            NamespaceKind::Cgroup => 7,
        }
    }

    /// Type of namespace stored at this position
    pub fn ns_type(self) -> NamespaceType {
        match self {
            NamespaceKind::Mount => NamespaceType::Mount,
            NamespaceKind::Uts => NamespaceType::Uts,
            NamespaceKind::Ipc => NamespaceType::Ipc,
            NamespaceKind::PidForChildren => NamespaceType::Pid,
            NamespaceKind::Net => NamespaceType::Net,
            NamespaceKind::Time | NamespaceKind::TimeForChildren => NamespaceType::Time,
            NamespaceKind::Cgroup => NamespaceType::Cgroup,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NamespaceKind::Mount => "mnt",
            NamespaceKind::Uts => "uts",
            NamespaceKind::Ipc => "ipc",
            NamespaceKind::PidForChildren => "pid_for_children",
            NamespaceKind::Net => "net",
            NamespaceKind::Time => "time",
            NamespaceKind::TimeForChildren => "time_for_children",
            NamespaceKind::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_indices_are_dense() {
        for (i, ty) in NamespaceType::ALL.iter().enumerate() {
            assert_eq!(ty.index(), i);
        }
    }

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in NamespaceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_no_bundle_kind_is_a_user_namespace() {
        assert!(NamespaceKind::ALL
            .iter()
            .all(|kind| kind.ns_type() != NamespaceType::User));
    }

    #[test]
    fn test_time_kinds_share_a_type() {
        assert_eq!(
            NamespaceKind::Time.ns_type(),
            NamespaceKind::TimeForChildren.ns_type()
        );
        assert_eq!(NamespaceKind::PidForChildren.ns_type(), NamespaceType::Pid);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(NamespaceType::Mount.to_string(), "mnt");
        assert_eq!(NamespaceKind::TimeForChildren.to_string(), "time_for_children");
    }
}
