//! Key orderings.
//!
//! A store is sorted by exactly one [`KeyOrdering`], chosen when the store is
//! created and recorded by name in its MANIFEST. Reopening with a different
//! ordering is refused rather than silently scrambling the sort.

use crate::config::Flags;
use crate::location::LOCATION_KEY_SIZE;
use std::cmp::Ordering;

/// Total order over stored keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyOrdering {
    /// Unsigned lexicographic byte order.
    #[default]
    Bytewise,

    /// Composite 8-byte `(file_id, offset)` order.
    ///
    /// Both operands must be exactly 8 bytes. `file_id` (first 4 bytes)
    /// decides; ties fall through to `offset` (last 4 bytes), each read as an
    /// unsigned 32-bit little-endian integer. All records of one file are
    /// therefore contiguous and sorted by position, so "symbols in file F at
    /// or after P" is a single forward scan from `seek((F, P))`.
    Location,
}

impl KeyOrdering {
    const BYTEWISE_NAME: &'static str = "xrefdb.BytewiseComparator";
    const LOCATION_NAME: &'static str = "LocationComparator";

    /// Selects the ordering requested by open flags.
    #[must_use]
    pub const fn from_flags(flags: Flags) -> Self {
        if flags.contains(Flags::LOCATION_KEYS) {
            Self::Location
        } else {
            Self::Bytewise
        }
    }

    /// The identifying name persisted alongside the store.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bytewise => Self::BYTEWISE_NAME,
            Self::Location => Self::LOCATION_NAME,
        }
    }

    /// Looks an ordering up by its persisted name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            Self::BYTEWISE_NAME => Some(Self::Bytewise),
            Self::LOCATION_NAME => Some(Self::Location),
            _ => None,
        }
    }

    /// Compares two keys.
    ///
    /// # Panics
    ///
    /// Under [`KeyOrdering::Location`], panics if either key is not exactly
    /// 8 bytes.
    #[must_use]
    pub fn compare(self, left: &[u8], right: &[u8]) -> Ordering {
        match self {
            Self::Bytewise => left.cmp(right),
            Self::Location => {
                self.check_key(left);
                self.check_key(right);
                let (lf, lo) = split_location(left);
                let (rf, ro) = split_location(right);
                lf.cmp(&rf).then(lo.cmp(&ro))
            }
        }
    }

    /// Asserts that `key` fits this ordering's key schema.
    ///
    /// # Panics
    ///
    /// Under [`KeyOrdering::Location`], panics if `key` is not exactly 8 bytes.
    pub fn check_key(self, key: &[u8]) {
        if self == Self::Location {
            assert_eq!(
                key.len(),
                LOCATION_KEY_SIZE,
                "location-ordered keys must be exactly {LOCATION_KEY_SIZE} bytes"
            );
        }
    }
}

fn split_location(key: &[u8]) -> (u32, u32) {
    let file_id = u32::from_le_bytes([key[0], key[1], key[2], key[3]]);
    let offset = u32::from_le_bytes([key[4], key[5], key[6], key[7]]);
    (file_id, offset)
}
