//! Namespace operations
//!
//! The bundle core may only create, derive and acquire namespaces; release
//! is `Drop`. This module defines that surface and its default
//! implementation.

use crate::error::NamespaceError;
use crate::namespace::Namespace;
use core_types::NamespaceType;
use identity::{NamespaceCharge, UserNamespace};
use resources::{ResourceError, MAX_NAMESPACE_LEVEL};
use std::sync::Arc;

/// How a type derives a new instance from an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivation {
    /// Child of the source, one level deeper; holds its parent alive
    Hierarchical,
    /// Copy of the source's state; records where it came from
    Copy,
    /// Brand-new empty instance; the source is ignored
    Fresh,
}

/// Derivation rule per namespace type
const DERIVATION_TABLE: [(NamespaceType, Derivation); 7] = [
    (NamespaceType::Mount, Derivation::Copy),
    (NamespaceType::Uts, Derivation::Copy),
    (NamespaceType::Ipc, Derivation::Fresh),
    (NamespaceType::Pid, Derivation::Hierarchical),
    (NamespaceType::Net, Derivation::Fresh),
    (NamespaceType::Time, Derivation::Copy),
    (NamespaceType::Cgroup, Derivation::Copy),
];

impl Derivation {
    /// Looks up the rule for `ty`
    ///
    /// User namespaces are hierarchical but are created through
    /// `identity`, not through [`NamespaceOps`].
    pub fn for_type(ty: NamespaceType) -> Derivation {
        DERIVATION_TABLE
            .iter()
            .find(|(t, _)| *t == ty)
            .map(|(_, d)| *d)
            .unwrap_or(Derivation::Hierarchical)
    }
}

/// Operations the bundle core performs on namespaces
pub trait NamespaceOps: Send + Sync {
    /// Creates a new instance of `ty` owned by `owner`
    fn create_fresh(
        &self,
        ty: NamespaceType,
        owner: &Arc<UserNamespace>,
    ) -> Result<Arc<Namespace>, NamespaceError>;

    /// Creates a new instance derived from `source`, owned by `owner`
    fn create_derived(
        &self,
        source: &Arc<Namespace>,
        owner: &Arc<UserNamespace>,
    ) -> Result<Arc<Namespace>, NamespaceError>;

    /// Takes another reference to an existing instance
    fn acquire(&self, ns: &Arc<Namespace>) -> Result<Arc<Namespace>, NamespaceError> {
        Ok(Arc::clone(ns))
    }
}

/// Default namespace operations
///
/// Every created namespace is charged against its owning user namespace
/// chain; the charge is returned when the namespace is destroyed.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardNamespaces;

impl StandardNamespaces {
    pub fn new() -> Self {
        Self
    }
}

impl NamespaceOps for StandardNamespaces {
    fn create_fresh(
        &self,
        ty: NamespaceType,
        owner: &Arc<UserNamespace>,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        if ty == NamespaceType::User {
            return Err(NamespaceError::Unsupported { ty });
        }
        let charge = NamespaceCharge::acquire(owner, ty)?;
        Ok(Namespace::charged(ty, charge, 0, None, None))
    }

    fn create_derived(
        &self,
        source: &Arc<Namespace>,
        owner: &Arc<UserNamespace>,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        let ty = source.ns_type();
        match Derivation::for_type(ty) {
            Derivation::Fresh => self.create_fresh(ty, owner),
            Derivation::Copy => {
                let charge = NamespaceCharge::acquire(owner, ty)?;
                Ok(Namespace::charged(
                    ty,
                    charge,
                    source.level(),
                    None,
                    Some(source.id()),
                ))
            }
            Derivation::Hierarchical => {
                if ty == NamespaceType::User {
                    return Err(NamespaceError::Unsupported { ty });
                }
                if source.level() >= MAX_NAMESPACE_LEVEL {
                    return Err(ResourceError::NestingTooDeep {
                        ty,
                        max: MAX_NAMESPACE_LEVEL,
                    }
                    .into());
                }
                let charge = NamespaceCharge::acquire(owner, ty)?;
                Ok(Namespace::charged(
                    ty,
                    charge,
                    source.level() + 1,
                    Some(Arc::clone(source)),
                    None,
                ))
            }
        }
    }
}
