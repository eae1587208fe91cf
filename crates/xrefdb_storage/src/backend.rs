//! Log device trait definition.

use crate::error::StorageResult;

/// An append-only byte device the engine writes its record log to.
///
/// Devices are **opaque**: the engine owns record framing, checksums and the
/// key index. A device only has to hand back exactly the bytes that were
/// appended at a given offset.
///
/// # Invariants
///
/// - `append` returns the offset the first byte landed at, and offsets only grow
/// - `read_into` fills the buffer with exactly the bytes previously appended there
/// - `sync` makes every appended byte survive process and OS crashes
/// - Positional reads take `&self` and may run concurrently with each other
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For tests
/// - [`super::FileBackend`] - For persistent stores
pub trait StorageBackend: Send + Sync {
    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends past the current size or an
    /// I/O error occurs.
    fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()>;

    /// Reads `len` bytes starting at `offset` into a fresh buffer.
    ///
    /// # Errors
    ///
    /// Same conditions as [`StorageBackend::read_into`].
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    /// Appends `data` to the end of the device and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces all appended data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes, which is the next append offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the device back to `new_size` bytes.
    ///
    /// Used to drop a torn record at the tail after a crash, so later
    /// appends start on a record boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is larger than the current size or the
    /// truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
