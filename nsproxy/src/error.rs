//! Namespace bundle errors

use crate::flags::CloneFlags;
use core_types::{NamespaceKind, NamespaceType};
use identity::IdentityError;
use namespaces::NamespaceError;
use resources::ResourceError;
use thiserror::Error;

/// Errors returned by bundle construction, unshare and setns
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NsError {
    #[error("Permission denied: {ty} namespace")]
    PermissionDenied { ty: NamespaceType },

    #[error("Invalid flag combination {flags:?}: {reason}")]
    InvalidFlags {
        flags: CloneFlags,
        reason: &'static str,
    },

    #[error("Cannot install {ty} namespace into this request")]
    NotInstallable { ty: NamespaceType },

    #[error("Bundle is incomplete: {staged} of {} members staged", NamespaceKind::COUNT)]
    Incomplete { staged: usize },

    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Coarse classification of [`NsError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsErrorKind {
    PermissionDenied,
    ResourceLimit,
    OutOfMemory,
    InvalidRequest,
}

impl NsError {
    pub fn kind(&self) -> NsErrorKind {
        match self {
            NsError::PermissionDenied { .. }
            | NsError::Namespace(NamespaceError::PermissionDenied { .. }) => {
                NsErrorKind::PermissionDenied
            }
            NsError::Namespace(NamespaceError::Resource(_))
            | NsError::Identity(IdentityError::Resource(_)) => NsErrorKind::ResourceLimit,
            NsError::Namespace(NamespaceError::OutOfMemory { .. }) => NsErrorKind::OutOfMemory,
            NsError::InvalidFlags { .. }
            | NsError::NotInstallable { .. }
            | NsError::Incomplete { .. }
            | NsError::Namespace(NamespaceError::Unsupported { .. })
            | NsError::Identity(IdentityError::SameUserNamespace(_)) => NsErrorKind::InvalidRequest,
        }
    }
}

impl From<ResourceError> for NsError {
    fn from(err: ResourceError) -> Self {
        NsError::Namespace(NamespaceError::Resource(err))
    }
}
