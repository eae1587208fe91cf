//! Composite `(file_id, offset)` keys.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Size of an encoded [`LocationKey`].
pub const LOCATION_KEY_SIZE: usize = 8;

/// A source position: which file, and where in it.
///
/// Encodes to exactly 8 bytes, `file_id` then `offset`, each little-endian.
/// The derived `Ord` matches [`crate::KeyOrdering::Location`] on the encoded
/// form.
///
/// ```rust
/// use xrefdb_core::LocationKey;
///
/// let key = LocationKey::new(3, 100);
/// let bytes = key.encode();
/// assert_eq!(LocationKey::decode(&bytes).unwrap(), key);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LocationKey {
    /// File identifier assigned by the indexer.
    pub file_id: u32,
    /// Byte offset inside the file.
    pub offset: u32,
}

impl LocationKey {
    /// Creates a location key.
    #[must_use]
    pub const fn new(file_id: u32, offset: u32) -> Self {
        Self { file_id, offset }
    }

    /// First possible key of `file_id`; seek here to scan one whole file.
    #[must_use]
    pub const fn file_start(file_id: u32) -> Self {
        Self { file_id, offset: 0 }
    }

    /// Encodes to the 8-byte stored form.
    #[must_use]
    pub fn encode(&self) -> [u8; LOCATION_KEY_SIZE] {
        let mut out = [0u8; LOCATION_KEY_SIZE];
        out[..4].copy_from_slice(&self.file_id.to_le_bytes());
        out[4..].copy_from_slice(&self.offset.to_le_bytes());
        out
    }

    /// Decodes the 8-byte stored form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKeySize`] if `bytes` is not 8 bytes long.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let raw: [u8; LOCATION_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CoreError::invalid_key_size(bytes.len(), LOCATION_KEY_SIZE))?;
        Ok(Self {
            file_id: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            offset: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        })
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file_id, self.offset)
    }
}
