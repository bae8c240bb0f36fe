//! Error types for arbor.

use thiserror::Error;

use crate::bucket::Operation;

/// Common error type for arbor.
#[derive(Error, Debug)]
pub enum ArborError {
    /// Attempt to create or rename something to the reserved root name.
    #[error("name '{0}' is reserved")]
    ReservedName(String),

    /// Attempt to mutate the root directory's name.
    #[error("{0} may not be modified")]
    ProtectedEntity(String),

    /// Referenced id does not resolve to a live entity.
    #[error("{0} not found")]
    NotFound(String),

    /// Move would create a cycle, or the destination does not exist.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// The object store could not sign, save or delete.
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),

    /// A signed URL was presented for a different operation than it was issued for.
    #[error("signed URL was issued for '{expected}' but used for '{actual}'")]
    OperationMismatch {
        /// Operation embedded in the token.
        expected: Operation,
        /// Operation actually requested.
        actual: Operation,
    },

    /// A signed URL was presented after its expiry.
    #[error("signed URL has expired")]
    Expired,

    /// A signed URL could not be parsed.
    #[error("malformed signed URL: {0}")]
    MalformedSignature(String),

    /// Validation error for caller input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for ArborError {
    fn from(e: sqlx::Error) -> Self {
        ArborError::Database(e.to_string())
    }
}

impl From<object_store::Error> for ArborError {
    fn from(e: object_store::Error) -> Self {
        ArborError::StoreUnavailable(e.to_string())
    }
}

/// Result type alias for arbor operations.
pub type Result<T> = std::result::Result<T, ArborError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_name_display() {
        let err = ArborError::ReservedName("root".to_string());
        assert_eq!(err.to_string(), "name 'root' is reserved");
    }

    #[test]
    fn test_not_found_display() {
        let err = ArborError::NotFound("directory".to_string());
        assert_eq!(err.to_string(), "directory not found");
    }

    #[test]
    fn test_operation_mismatch_display() {
        let err = ArborError::OperationMismatch {
            expected: Operation::Put,
            actual: Operation::Get,
        };
        assert_eq!(
            err.to_string(),
            "signed URL was issued for 'put' but used for 'get'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ArborError = io_err.into();
        assert!(matches!(err, ArborError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: ArborError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ArborError::Database(_)));
    }
}
