//! Database configuration.

use std::ops::BitOr;

/// Default auto-flush threshold for [`crate::Batch`]: 1 MiB of value bytes.
pub const BATCH_THRESHOLD: usize = 1024 * 1024;

/// Open-time flags.
///
/// ```rust
/// use xrefdb_core::Flags;
///
/// let flags = Flags::NONE | Flags::LOCATION_KEYS;
/// assert!(flags.contains(Flags::LOCATION_KEYS));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    /// No flags: bytewise key ordering.
    pub const NONE: Self = Self(0);

    /// Keys are 8-byte `(file_id, offset)` locations ordered by
    /// [`crate::KeyOrdering::Location`].
    pub const LOCATION_KEYS: Self = Self(1);

    /// Builds flags from raw bits, dropping unknown ones.
    #[must_use]
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::LOCATION_KEYS.0)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the value cache in MiB. Zero disables the cache.
    pub cache_size_mb: usize,

    /// Open flags, which select the key ordering.
    pub flags: Flags,

    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the log after every write (safer but slower).
    pub sync_on_write: bool,

    /// Buffered value bytes at which a [`crate::Batch`] flushes itself.
    pub batch_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_size_mb: 0,
            flags: Flags::NONE,
            create_if_missing: true,
            sync_on_write: false,
            batch_threshold: BATCH_THRESHOLD,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value cache size in MiB.
    #[must_use]
    pub const fn cache_size_mb(mut self, mb: usize) -> Self {
        self.cache_size_mb = mb;
        self
    }

    /// Sets the open flags.
    #[must_use]
    pub const fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the batch auto-flush threshold in bytes.
    #[must_use]
    pub const fn batch_threshold(mut self, bytes: usize) -> Self {
        self.batch_threshold = bytes;
        self
    }

    /// Cache capacity in bytes.
    pub(crate) fn cache_capacity(&self) -> usize {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }
}
