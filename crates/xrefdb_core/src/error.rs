//! Error types for xrefdb core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in xrefdb core operations.
///
/// Key-schema violations under location ordering and batches built on a
/// read scope are caller bugs and panic instead of surfacing here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Log device error.
    #[error("storage error: {0}")]
    Storage(#[from] xrefdb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record log is corrupted or invalid.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch on a log record.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Another handle or process holds the store directory.
    #[error("database locked: another handle has exclusive access")]
    DatabaseLocked,

    /// Invalid store layout, manifest or version.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The store was created under a different key ordering.
    #[error("key ordering mismatch: store uses {stored}, open requested {requested}")]
    OrderingMismatch {
        /// Ordering name recorded in the manifest.
        stored: String,
        /// Ordering name selected by the open flags.
        requested: String,
    },

    /// The handle failed to open or has been closed.
    #[error("database is not opened")]
    NotOpened,

    /// Bytes of the wrong length were decoded as a fixed-size key.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }
}
