//! Error types for log device operations.

use std::io;
use thiserror::Error;

/// Result type for log device operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur on a log device.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read touched bytes past the end of the device.
    #[error("read beyond end of log: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current device size.
        size: u64,
    },

    /// A truncate asked to grow the device.
    #[error("cannot truncate log of {size} bytes to {requested} bytes")]
    InvalidTruncate {
        /// The requested new size.
        requested: u64,
        /// The current device size.
        size: u64,
    },
}

impl StorageError {
    pub(crate) fn check_range(offset: u64, len: usize, size: u64) -> StorageResult<()> {
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(Self::ReadPastEnd { offset, len, size });
        }
        Ok(())
    }
}
