//! # Resources
//!
//! This crate provides namespace accounting primitives.
//!
//! ## Philosophy
//!
//! - **Namespaces are finite and must be explicit**
//! - **Limits are enforced, not advisory**
//! - **Accounting is lock-free and testable**
//! - **Charging is all-or-nothing**: a failed charge leaves no trace
//!
//! ## Core Concepts
//!
//! - `NamespaceLimits`: Per-type maximum number of live namespaces
//! - `NamespaceCounts`: Live counters plus the limits they are checked against
//! - `ResourceError`: Why a charge or a nesting request was refused
//!
//! Counters live inside every user namespace. Charging a namespace type
//! walks the user namespace and all of its ancestors, so a limit set at any
//! level caps everything created below it.

use core_types::NamespaceType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Maximum nesting depth for hierarchical namespaces (user and PID)
pub const MAX_NAMESPACE_LEVEL: u32 = 32;

/// Default per-type limit for the root user namespace
pub const DEFAULT_MAX_NAMESPACES: u32 = 65_536;

/// Per-type namespace limits
///
/// Field names follow the `user.max_*_namespaces` tunables so config files
/// read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceLimits {
    pub max_user_namespaces: u32,
    pub max_mnt_namespaces: u32,
    pub max_uts_namespaces: u32,
    pub max_ipc_namespaces: u32,
    pub max_pid_namespaces: u32,
    pub max_net_namespaces: u32,
    pub max_time_namespaces: u32,
    pub max_cgroup_namespaces: u32,
}

impl NamespaceLimits {
    /// No limit on any type
    pub fn unlimited() -> Self {
        Self::uniform(u32::MAX)
    }

    /// The same limit for every type
    pub fn uniform(limit: u32) -> Self {
        Self {
            max_user_namespaces: limit,
            max_mnt_namespaces: limit,
            max_uts_namespaces: limit,
            max_ipc_namespaces: limit,
            max_pid_namespaces: limit,
            max_net_namespaces: limit,
            max_time_namespaces: limit,
            max_cgroup_namespaces: limit,
        }
    }

    /// Returns the limit for a type
    pub fn get(&self, ty: NamespaceType) -> u32 {
        match ty {
            NamespaceType::User => self.max_user_namespaces,
            NamespaceType::Mount => self.max_mnt_namespaces,
            NamespaceType::Uts => self.max_uts_namespaces,
            NamespaceType::Ipc => self.max_ipc_namespaces,
            NamespaceType::Pid => self.max_pid_namespaces,
            NamespaceType::Net => self.max_net_namespaces,
            NamespaceType::Time => self.max_time_namespaces,
            NamespaceType::Cgroup => self.max_cgroup_namespaces,
        }
    }

    /// Builder: sets the limit for one type
    pub fn with_limit(mut self, ty: NamespaceType, limit: u32) -> Self {
        let slot = match ty {
            NamespaceType::User => &mut self.max_user_namespaces,
            NamespaceType::Mount => &mut self.max_mnt_namespaces,
            NamespaceType::Uts => &mut self.max_uts_namespaces,
            NamespaceType::Ipc => &mut self.max_ipc_namespaces,
            NamespaceType::Pid => &mut self.max_pid_namespaces,
            NamespaceType::Net => &mut self.max_net_namespaces,
            NamespaceType::Time => &mut self.max_time_namespaces,
            NamespaceType::Cgroup => &mut self.max_cgroup_namespaces,
        };
        *slot = limit;
        self
    }

    /// Returns the most restrictive combination of two limit sets
    pub fn min(&self, other: &NamespaceLimits) -> NamespaceLimits {
        NamespaceType::ALL
            .iter()
            .fold(*self, |acc, &ty| acc.with_limit(ty, self.get(ty).min(other.get(ty))))
    }
}

impl Default for NamespaceLimits {
    fn default() -> Self {
        Self::uniform(DEFAULT_MAX_NAMESPACES)
    }
}

impl fmt::Display for NamespaceLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = NamespaceType::ALL
            .iter()
            .filter(|ty| self.get(**ty) != u32::MAX)
            .map(|ty| format!("{}={}", ty, self.get(*ty)))
            .collect();
        if parts.is_empty() {
            write!(f, "NamespaceLimits[unlimited]")
        } else {
            write!(f, "NamespaceLimits[{}]", parts.join(", "))
        }
    }
}

/// Live namespace counters for one user namespace
///
/// Counters are plain atomics: charging never takes a lock and never blocks.
#[derive(Debug)]
pub struct NamespaceCounts {
    counts: [AtomicU32; NamespaceType::COUNT],
    limits: [AtomicU32; NamespaceType::COUNT],
}

impl NamespaceCounts {
    /// Creates zeroed counters checked against `limits`
    pub fn new(limits: NamespaceLimits) -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU32::new(0)),
            limits: std::array::from_fn(|i| AtomicU32::new(limits.get(NamespaceType::ALL[i]))),
        }
    }

    /// Returns a snapshot of the current limits
    pub fn limits(&self) -> NamespaceLimits {
        NamespaceType::ALL.iter().fold(NamespaceLimits::unlimited(), |acc, &ty| {
            acc.with_limit(ty, self.limits[ty.index()].load(Ordering::Acquire))
        })
    }

    /// Replaces the limit for one type
    ///
    /// Lowering a limit below the live count does not destroy anything;
    /// it only refuses further charges.
    pub fn set_limit(&self, ty: NamespaceType, limit: u32) {
        self.limits[ty.index()].store(limit, Ordering::Release);
    }

    /// Returns the live count for a type
    pub fn count(&self, ty: NamespaceType) -> u32 {
        self.counts[ty.index()].load(Ordering::Acquire)
    }

    /// Returns true when nothing is charged
    pub fn is_idle(&self) -> bool {
        NamespaceType::ALL.iter().all(|ty| self.count(*ty) == 0)
    }

    /// Increments the counter for `ty` unless that would exceed its limit
    pub fn try_charge(&self, ty: NamespaceType) -> Result<(), ResourceError> {
        let limit = self.limits[ty.index()].load(Ordering::Acquire);
        self.counts[ty.index()]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                if count < limit {
                    Some(count + 1)
                } else {
                    None
                }
            })
            .map(|_| ())
            .map_err(|_| ResourceError::LimitExceeded { ty, limit })
    }

    /// Decrements the counter for `ty`
    pub fn uncharge(&self, ty: NamespaceType) {
        let previous = self.counts[ty.index()].fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "uncharged {} below zero", ty);
    }
}

impl Default for NamespaceCounts {
    fn default() -> Self {
        Self::new(NamespaceLimits::default())
    }
}

/// Resource-related errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Namespace limit exceeded: {ty} (limit {limit})")]
    LimitExceeded { ty: NamespaceType, limit: u32 },

    #[error("Namespace nesting too deep: {ty} (max level {max})")]
    NestingTooDeep { ty: NamespaceType, max: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_limits_default() {
        let limits = NamespaceLimits::default();
        for ty in NamespaceType::ALL {
            assert_eq!(limits.get(ty), DEFAULT_MAX_NAMESPACES);
        }
    }

    #[test]
    fn test_limits_builder() {
        let limits = NamespaceLimits::unlimited()
            .with_limit(NamespaceType::Net, 4)
            .with_limit(NamespaceType::User, 2);
        assert_eq!(limits.get(NamespaceType::Net), 4);
        assert_eq!(limits.get(NamespaceType::User), 2);
        assert_eq!(limits.get(NamespaceType::Mount), u32::MAX);
    }

    #[test]
    fn test_limits_min() {
        let a = NamespaceLimits::uniform(10).with_limit(NamespaceType::Pid, 3);
        let b = NamespaceLimits::uniform(5);
        let min = a.min(&b);
        assert_eq!(min.get(NamespaceType::Pid), 3);
        assert_eq!(min.get(NamespaceType::Ipc), 5);
    }

    #[test]
    fn test_limits_display() {
        assert_eq!(
            NamespaceLimits::unlimited().to_string(),
            "NamespaceLimits[unlimited]"
        );
        let limits = NamespaceLimits::unlimited().with_limit(NamespaceType::Net, 2);
        assert_eq!(limits.to_string(), "NamespaceLimits[net=2]");
    }

    #[test]
    fn test_limits_deserialize_partial() {
        let limits: NamespaceLimits =
            serde_json::from_str(r#"{"max_net_namespaces": 7}"#).unwrap();
        assert_eq!(limits.get(NamespaceType::Net), 7);
        assert_eq!(limits.get(NamespaceType::Uts), DEFAULT_MAX_NAMESPACES);
    }

    #[test]
    fn test_charge_until_limit() {
        let counts = NamespaceCounts::new(NamespaceLimits::unlimited().with_limit(NamespaceType::Ipc, 2));
        assert!(counts.try_charge(NamespaceType::Ipc).is_ok());
        assert!(counts.try_charge(NamespaceType::Ipc).is_ok());
        assert_eq!(
            counts.try_charge(NamespaceType::Ipc),
            Err(ResourceError::LimitExceeded {
                ty: NamespaceType::Ipc,
                limit: 2
            })
        );
        assert_eq!(counts.count(NamespaceType::Ipc), 2);

        counts.uncharge(NamespaceType::Ipc);
        assert!(counts.try_charge(NamespaceType::Ipc).is_ok());
    }

    #[test]
    fn test_zero_limit_refuses_everything() {
        let counts = NamespaceCounts::new(NamespaceLimits::uniform(0));
        for ty in NamespaceType::ALL {
            assert!(counts.try_charge(ty).is_err());
        }
        assert!(counts.is_idle());
    }

    #[test]
    fn test_set_limit() {
        let counts = NamespaceCounts::default();
        counts.set_limit(NamespaceType::Time, 1);
        assert_eq!(counts.limits().get(NamespaceType::Time), 1);
        assert!(counts.try_charge(NamespaceType::Time).is_ok());
        assert!(counts.try_charge(NamespaceType::Time).is_err());
    }

    #[test]
    fn test_concurrent_charges_never_exceed_limit() {
        let counts = Arc::new(NamespaceCounts::new(
            NamespaceLimits::unlimited().with_limit(NamespaceType::Net, 50),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counts = Arc::clone(&counts);
                thread::spawn(move || {
                    let mut granted = 0u32;
                    for _ in 0..100 {
                        if counts.try_charge(NamespaceType::Net).is_ok() {
                            granted += 1;
                        }
                    }
                    granted
                })
            })
            .collect();

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 50);
        assert_eq!(counts.count(NamespaceType::Net), 50);
    }
}
