//! Error types for ShelfDB.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ShelfError.
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Errors that can occur in ShelfDB operations.
///
/// Absent records and keys are not errors: lookups return `Option`,
/// deletes return `bool` and heap updates report `UpdateOutcome::NotFound`.
#[derive(Debug, Error)]
pub enum ShelfError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Heap errors
    #[error("Store is empty: {}", path.display())]
    EmptyStore { path: PathBuf },

    #[error("Duplicate identifier {id} (last assigned id is {last_id})")]
    DuplicateIdentifier { id: i32, last_id: i32 },

    #[error("Record codec error: {0}")]
    Codec(String),

    // Index errors
    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Bucket overflow at depth {depth}: entries cannot be separated by hashing")]
    BucketOverflow { depth: u8 },

    #[error("Corrupted file {}: {reason}", path.display())]
    Corrupted { path: PathBuf, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ShelfError {
    /// Builds a `Corrupted` error for the given file.
    pub fn corrupted(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ShelfError::Corrupted {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for the recoverable "no data yet" condition.
    pub fn is_empty_store(&self) -> bool {
        matches!(self, ShelfError::EmptyStore { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_io_error_conversion() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: ShelfError = io_err.into();
        assert!(matches!(err, ShelfError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_duplicate_identifier_display() {
        let err = ShelfError::DuplicateIdentifier { id: 3, last_id: 7 };
        assert_eq!(
            err.to_string(),
            "Duplicate identifier 3 (last assigned id is 7)"
        );
    }

    #[test]
    fn test_empty_store_display() {
        let err = ShelfError::EmptyStore {
            path: PathBuf::from("/tmp/shows.db"),
        };
        assert_eq!(err.to_string(), "Store is empty: /tmp/shows.db");
        assert!(err.is_empty_store());
    }

    #[test]
    fn test_corrupted_display() {
        let err = ShelfError::corrupted("idx.db", "page order mismatch");
        assert_eq!(err.to_string(), "Corrupted file idx.db: page order mismatch");
        assert!(!err.is_empty_store());
    }

    #[test]
    fn test_index_errors_display() {
        assert_eq!(ShelfError::DuplicateKey.to_string(), "Duplicate key");
        let err = ShelfError::BucketOverflow { depth: 32 };
        assert!(err.to_string().starts_with("Bucket overflow at depth 32"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ShelfError::InvalidConfiguration("btree order 2 < 3".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: btree order 2 < 3");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ShelfError>();
    }
}
