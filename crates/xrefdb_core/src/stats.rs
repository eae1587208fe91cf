//! Storage statistics.
//!
//! Counters are atomic and can be read while operations are in progress.
//!
//! ```rust
//! use xrefdb_core::{Database, Flags};
//!
//! let db = Database::open_in_memory(Flags::NONE);
//! db.put(b"key", b"value").unwrap();
//! assert_eq!(db.stats().writes(), 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Storage statistics.
///
/// Values only grow for the lifetime of one open handle.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Point lookups.
    reads: AtomicU64,
    /// Put operations, batched or not.
    writes: AtomicU64,
    /// Delete operations, batched or not.
    deletes: AtomicU64,
    /// Engine writes (one log record each).
    log_writes: AtomicU64,
    /// Value bytes written.
    bytes_written: AtomicU64,
    /// Value bytes loaded from the log.
    bytes_read: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    compactions: AtomicU64,
}

impl StorageStats {
    /// Creates a zeroed stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_log_write(&self, puts: u64, deletes: u64, value_bytes: u64) {
        self.log_writes.fetch_add(1, Ordering::Relaxed);
        self.writes.fetch_add(puts, Ordering::Relaxed);
        self.deletes.fetch_add(deletes, Ordering::Relaxed);
        self.bytes_written.fetch_add(value_bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_value_load(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of point lookups.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of put operations.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of delete operations.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Returns the number of engine writes.
    ///
    /// A single `put` or `remove` is one engine write; a whole
    /// [`crate::Batch`] flush is also one.
    pub fn log_writes(&self) -> u64 {
        self.log_writes.load(Ordering::Relaxed)
    }

    /// Returns the total value bytes written.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the total value bytes loaded from the log.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the number of value cache hits.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Returns the number of value cache misses.
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Returns the number of completed compactions.
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            log_writes: self.log_writes(),
            bytes_written: self.bytes_written(),
            bytes_read: self.bytes_read(),
            cache_hits: self.cache_hits(),
            cache_misses: self.cache_misses(),
            compactions: self.compactions(),
        }
    }
}

/// A point-in-time copy of [`StorageStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Point lookups.
    pub reads: u64,
    /// Put operations.
    pub writes: u64,
    /// Delete operations.
    pub deletes: u64,
    /// Engine writes.
    pub log_writes: u64,
    /// Value bytes written.
    pub bytes_written: u64,
    /// Value bytes loaded from the log.
    pub bytes_read: u64,
    /// Value cache hits.
    pub cache_hits: u64,
    /// Value cache misses.
    pub cache_misses: u64,
    /// Completed compactions.
    pub compactions: u64,
}
