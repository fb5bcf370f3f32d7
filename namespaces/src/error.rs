//! Namespace operation errors

use core_types::NamespaceType;
use resources::ResourceError;
use thiserror::Error;

/// Errors returned by [`crate::NamespaceOps`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Out of memory allocating {ty} namespace")]
    OutOfMemory { ty: NamespaceType },

    #[error("Permission denied creating {ty} namespace")]
    PermissionDenied { ty: NamespaceType },

    #[error("{ty} namespaces are not created through namespace operations")]
    Unsupported { ty: NamespaceType },
}

impl NamespaceError {
    /// Namespace type the error is about
    pub fn ns_type(&self) -> NamespaceType {
        match self {
            NamespaceError::Resource(ResourceError::LimitExceeded { ty, .. })
            | NamespaceError::Resource(ResourceError::NestingTooDeep { ty, .. })
            | NamespaceError::OutOfMemory { ty }
            | NamespaceError::PermissionDenied { ty }
            | NamespaceError::Unsupported { ty } => *ty,
        }
    }
}
