//! In-memory log device.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory log device.
///
/// Clones share one buffer. A test can keep a clone, hand the original to an
/// engine, and later reopen a second engine over the same bytes, which is
/// how crash and reopen scenarios are simulated without touching disk.
///
/// # Example
///
/// ```rust
/// use xrefdb_storage::{StorageBackend, InMemoryBackend};
///
/// let mut log = InMemoryBackend::new();
/// let view = log.clone();
/// log.append(b"abc").unwrap();
/// assert_eq!(view.size().unwrap(), 3);
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device preloaded with `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns a copy of the device contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites bytes in place starting at `offset`.
    ///
    /// Only meant for tests that simulate on-media corruption.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is outside the current contents.
    pub fn overwrite(&self, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        StorageError::check_range(offset, bytes.len(), data.len() as u64)?;
        let start = offset as usize;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
        let data = self.data.read();
        StorageError::check_range(offset, buf.len(), data.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_report_increasing_offsets() {
        let mut log = InMemoryBackend::new();
        assert_eq!(log.append(b"fn main").unwrap(), 0);
        assert_eq!(log.append(b"()").unwrap(), 7);
        assert_eq!(log.size().unwrap(), 9);
    }

    #[test]
    fn read_into_returns_appended_bytes() {
        let mut log = InMemoryBackend::new();
        log.append(b"struct Foo;").unwrap();

        let mut buf = [0u8; 3];
        log.read_into(7, &mut buf).unwrap();
        assert_eq!(&buf, b"Foo");
        assert_eq!(log.read_at(0, 6).unwrap(), b"struct");
    }

    #[test]
    fn reading_past_end_fails() {
        let mut log = InMemoryBackend::new();
        log.append(b"short").unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(
            log.read_into(3, &mut buf),
            Err(StorageError::ReadPastEnd { size: 5, .. })
        ));
        assert!(log.read_at(9, 1).is_err());
    }

    #[test]
    fn zero_length_read_at_end_is_allowed() {
        let mut log = InMemoryBackend::new();
        log.append(b"abc").unwrap();
        assert!(log.read_at(3, 0).unwrap().is_empty());
    }

    #[test]
    fn clones_share_the_buffer() {
        let mut log = InMemoryBackend::new();
        let other = log.clone();
        log.append(b"shared").unwrap();
        assert_eq!(other.data(), b"shared");
    }

    #[test]
    fn overwrite_patches_in_place() {
        let log = InMemoryBackend::with_data(b"aaaa".to_vec());
        log.overwrite(1, b"bb").unwrap();
        assert_eq!(log.data(), b"abba");
        assert!(log.overwrite(3, b"xx").is_err());
    }

    #[test]
    fn truncate_drops_the_tail() {
        let mut log = InMemoryBackend::with_data(b"complete|torn".to_vec());
        log.truncate(8).unwrap();
        assert_eq!(log.data(), b"complete");
        assert_eq!(log.append(b"!").unwrap(), 8);
    }

    #[test]
    fn truncate_cannot_grow() {
        let mut log = InMemoryBackend::with_data(b"abc".to_vec());
        assert!(matches!(
            log.truncate(10),
            Err(StorageError::InvalidTruncate {
                requested: 10,
                size: 3
            })
        ));
    }
}
