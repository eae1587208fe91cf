//! Store manifest.
//!
//! The manifest identifies a store: its format version and the name of the
//! key ordering it was created with. It is written once at creation and
//! checked on every reopen.

use crate::error::{CoreError, CoreResult};
use crate::ordering::KeyOrdering;

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"XMFN";

/// Current manifest encoding version.
pub const MANIFEST_VERSION: u16 = 1;

/// Current store format version.
pub const FORMAT_VERSION: (u16, u16) = (1, 0);

/// Store identity persisted next to the data log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Name of the key ordering the store is sorted by.
    pub ordering_name: String,
}

impl Manifest {
    /// Creates a manifest for a new store sorted by `ordering`.
    #[must_use]
    pub fn new(ordering: KeyOrdering) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            ordering_name: ordering.name().to_string(),
        }
    }

    /// Checks that this store may be opened with `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::OrderingMismatch`] if the store was created under
    /// another ordering, and [`CoreError::InvalidFormat`] if its major format
    /// version is newer than this build understands.
    pub fn validate(&self, requested: KeyOrdering) -> CoreResult<()> {
        if self.format_version.0 > FORMAT_VERSION.0 {
            return Err(CoreError::invalid_format(format!(
                "unsupported store format {}.{}",
                self.format_version.0, self.format_version.1
            )));
        }
        if self.ordering_name != requested.name() {
            return Err(CoreError::OrderingMismatch {
                stored: self.ordering_name.clone(),
                requested: requested.name().to_string(),
            });
        }
        Ok(())
    }

    /// Encodes the manifest to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let name = self.ordering_name.as_bytes();
        let name_len = u16::try_from(name.len()).unwrap_or(u16::MAX);

        let mut buf = Vec::with_capacity(12 + name.len());
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.format_version.0.to_le_bytes());
        buf.extend_from_slice(&self.format_version.1.to_le_bytes());
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(&name[..usize::from(name_len)]);
        buf
    }

    /// Decodes a manifest from bytes.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let mut cursor = 0;
        let read_u16 = |bytes: &[u8]| u16::from_le_bytes([bytes[0], bytes[1]]);

        if take(data, &mut cursor, 4)? != MANIFEST_MAGIC {
            return Err(CoreError::invalid_format("invalid manifest magic"));
        }

        let version = read_u16(take(data, &mut cursor, 2)?);
        if version > MANIFEST_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version: {version}"
            )));
        }

        let major = read_u16(take(data, &mut cursor, 2)?);
        let minor = read_u16(take(data, &mut cursor, 2)?);
        let name_len = usize::from(read_u16(take(data, &mut cursor, 2)?));
        let ordering_name = std::str::from_utf8(take(data, &mut cursor, name_len)?)
            .map_err(|_| CoreError::invalid_format("ordering name is not UTF-8"))?
            .to_string();

        if cursor != data.len() {
            return Err(CoreError::invalid_format(format!(
                "trailing bytes in manifest: expected {cursor} bytes, got {}",
                data.len()
            )));
        }

        Ok(Self {
            format_version: (major, minor),
            ordering_name,
        })
    }
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, n: usize) -> CoreResult<&'a [u8]> {
    if *cursor + n > data.len() {
        return Err(CoreError::invalid_format("manifest too short"));
    }
    let bytes = &data[*cursor..*cursor + n];
    *cursor += n;
    Ok(bytes)
}
