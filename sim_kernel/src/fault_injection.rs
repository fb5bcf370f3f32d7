//! Deterministic fault injection for namespace operations
//!
//! Wraps [`StandardNamespaces`] and fails selected calls, so tests can
//! exercise every failure point of bundle construction.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: faults are chosen by call index or type, never at random
//! - **Composable**: a plan holds any number of faults; the first match wins
//! - **Test-focused**: not intended for production use
//!
//! ## Example
//!
//! ```
//! use sim_kernel::fault_injection::{FaultPlan, NamespaceFault};
//! use core_types::NamespaceType;
//!
//! let plan = FaultPlan::new()
//!     .with_fault(NamespaceFault::FailNth { call: 3 })
//!     .with_fault(NamespaceFault::DenyType { ty: NamespaceType::Net });
//! assert_eq!(plan.faults().len(), 2);
//! ```

use core_types::NamespaceType;
use identity::UserNamespace;
use namespaces::{Namespace, NamespaceError, NamespaceOps, StandardNamespaces};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A fault to inject into namespace operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceFault {
    /// Fail the Nth operation (0-based), counting creates and acquires
    FailNth { call: usize },

    /// Fail every creation of this type with an allocation failure
    FailType { ty: NamespaceType },

    /// Refuse every creation of this type
    DenyType { ty: NamespaceType },
}

/// A plan describing all faults to inject
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    faults: Vec<NamespaceFault>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self { faults: Vec::new() }
    }

    /// Adds a fault to the plan
    pub fn with_fault(mut self, fault: NamespaceFault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn faults(&self) -> &[NamespaceFault] {
        &self.faults
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Acquire,
}

/// Namespace operations that apply a [`FaultPlan`]
#[derive(Debug)]
pub struct FaultInjectingOps {
    plan: FaultPlan,
    inner: StandardNamespaces,
    calls: AtomicUsize,
    injected: AtomicUsize,
}

impl FaultInjectingOps {
    pub fn new(plan: FaultPlan) -> Self {
        Self {
            plan,
            inner: StandardNamespaces::new(),
            calls: AtomicUsize::new(0),
            injected: AtomicUsize::new(0),
        }
    }

    /// Operations attempted so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Faults injected so far
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    fn check(&self, op: Operation, ty: NamespaceType) -> Result<(), NamespaceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.plan.faults.iter().find_map(|fault| match fault {
            NamespaceFault::FailNth { call: n } if *n == call => {
                Some(NamespaceError::OutOfMemory { ty })
            }
            NamespaceFault::FailType { ty: t } if *t == ty && op == Operation::Create => {
                Some(NamespaceError::OutOfMemory { ty })
            }
            NamespaceFault::DenyType { ty: t } if *t == ty && op == Operation::Create => {
                Some(NamespaceError::PermissionDenied { ty })
            }
            _ => None,
        });
        match fault {
            Some(err) => {
                self.injected.fetch_add(1, Ordering::SeqCst);
                log::debug!("injecting fault at call {}: {}", call, err);
                Err(err)
            }
            None => Ok(()),
        }
    }
}

impl NamespaceOps for FaultInjectingOps {
    fn create_fresh(
        &self,
        ty: NamespaceType,
        owner: &Arc<UserNamespace>,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        self.check(Operation::Create, ty)?;
        self.inner.create_fresh(ty, owner)
    }

    fn create_derived(
        &self,
        source: &Arc<Namespace>,
        owner: &Arc<UserNamespace>,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        self.check(Operation::Create, source.ns_type())?;
        self.inner.create_derived(source, owner)
    }

    fn acquire(&self, ns: &Arc<Namespace>) -> Result<Arc<Namespace>, NamespaceError> {
        self.check(Operation::Acquire, ns.ns_type())?;
        self.inner.acquire(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resources::NamespaceLimits;

    fn owner() -> Arc<UserNamespace> {
        UserNamespace::new_root(NamespaceLimits::default())
    }

    #[test]
    fn test_empty_plan_passes_through() {
        let ops = FaultInjectingOps::new(FaultPlan::new());
        let owner = owner();
        let ns = ops.create_fresh(NamespaceType::Uts, &owner).unwrap();
        assert!(ops.acquire(&ns).is_ok());
        assert_eq!(ops.calls(), 2);
        assert_eq!(ops.injected(), 0);
    }

    #[test]
    fn test_fail_nth() {
        let ops = FaultInjectingOps::new(FaultPlan::new().with_fault(NamespaceFault::FailNth { call: 1 }));
        let owner = owner();
        let ns = ops.create_fresh(NamespaceType::Ipc, &owner).unwrap();
        let err = ops.acquire(&ns).unwrap_err();
        assert_eq!(err, NamespaceError::OutOfMemory { ty: NamespaceType::Ipc });
        assert!(ops.acquire(&ns).is_ok());
        assert_eq!(ops.injected(), 1);
    }

    #[test]
    fn test_type_faults_skip_acquire() {
        let plan = FaultPlan::new()
            .with_fault(NamespaceFault::FailType { ty: NamespaceType::Net })
            .with_fault(NamespaceFault::DenyType { ty: NamespaceType::Mount });
        let ops = FaultInjectingOps::new(plan);
        let owner = owner();

        assert_eq!(
            ops.create_fresh(NamespaceType::Net, &owner).unwrap_err(),
            NamespaceError::OutOfMemory { ty: NamespaceType::Net }
        );
        let mnt = Namespace::initial(NamespaceType::Mount, Arc::clone(&owner));
        assert_eq!(
            ops.create_derived(&mnt, &owner).unwrap_err(),
            NamespaceError::PermissionDenied { ty: NamespaceType::Mount }
        );
        assert!(ops.acquire(&mnt).is_ok());
        assert!(owner.counts().is_idle());
    }
}
