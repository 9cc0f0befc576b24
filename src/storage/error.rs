//! Storage error classification.

use thiserror::Error;

/// Errors returned by storage collaborators.
///
/// Variants mirror the status codes the harness branches on; everything it
/// does not branch on is still kept distinct so the final report is useful.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// Table, family or row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource is already present.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Service or routed target cannot be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Request was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A message exceeded a configured size limit.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StorageError::AlreadyExists(_))
    }

    /// Short stable label used for metrics.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "not_found",
            StorageError::AlreadyExists(_) => "already_exists",
            StorageError::PermissionDenied(_) => "permission_denied",
            StorageError::Unavailable(_) => "unavailable",
            StorageError::InvalidArgument(_) => "invalid_argument",
            StorageError::ResourceExhausted(_) => "resource_exhausted",
            StorageError::Internal(_) => "internal",
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(StorageError::NotFound("t".into()).is_not_found());
        assert!(!StorageError::Unavailable("t".into()).is_not_found());
        assert!(StorageError::AlreadyExists("t".into()).is_already_exists());
        assert_eq!(StorageError::PermissionDenied("x".into()).code(), "permission_denied");
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::NotFound("table \"t1\"".into());
        assert_eq!(err.to_string(), "not found: table \"t1\"");
    }
}
