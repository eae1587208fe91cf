//! Buffered writes with size-triggered flushing.

use crate::database::Database;
use crate::engine::WriteSet;
use crate::error::CoreResult;
use crate::scoped::{LockMode, ScopedDb};
use crate::view::ByteView;

/// Accumulates puts and removes and applies them in atomic groups.
///
/// Only put values count toward the threshold; keys and removes do not.
/// When the buffered value bytes reach the threshold, the batch flushes
/// itself before `put` returns. Whatever is still pending when the batch is
/// dropped is flushed then, so nothing buffered is lost on an early return.
///
/// A batch borrows a write-locked [`ScopedDb`] and cannot outlive it.
///
/// ```rust
/// use xrefdb_core::{Batch, Database, Flags, ReadWriteLock, ScopedDb};
///
/// let db = Database::open_in_memory(Flags::NONE);
/// let lock = ReadWriteLock::new(());
/// let scope = ScopedDb::write(&db, &lock);
///
/// let mut batch = Batch::with_threshold(&scope, 8);
/// batch.put(b"a", b"1234").unwrap();
/// assert_eq!(batch.pending_bytes(), 4);
/// batch.put(b"b", b"5678").unwrap(); // reaches 8 and flushes
/// assert_eq!(batch.pending_bytes(), 0);
/// assert_eq!(batch.total(), 8);
/// drop(batch);
///
/// assert!(scope.contains(b"b").unwrap());
/// ```
pub struct Batch<'s> {
    db: &'s Database,
    pending: WriteSet,
    pending_bytes: usize,
    total: usize,
    threshold: usize,
}

impl<'s> Batch<'s> {
    /// Creates a batch using the database's configured threshold.
    ///
    /// # Panics
    ///
    /// Panics if `scope` does not hold the lock in [`LockMode::Write`].
    pub fn new(scope: &'s ScopedDb<'_>) -> Self {
        let threshold = scope.database().config().batch_threshold;
        Self::with_threshold(scope, threshold)
    }

    /// Creates a batch that flushes every `threshold` buffered value bytes.
    ///
    /// # Panics
    ///
    /// Panics if `scope` does not hold the lock in [`LockMode::Write`].
    pub fn with_threshold(scope: &'s ScopedDb<'_>, threshold: usize) -> Self {
        assert_eq!(
            scope.lock_mode(),
            LockMode::Write,
            "Batch requires a write-locked ScopedDb"
        );
        Self {
            db: scope.database(),
            pending: WriteSet::new(),
            pending_bytes: 0,
            total: 0,
            threshold,
        }
    }

    /// Buffers a put and returns the value length.
    ///
    /// Flushes first if this put brings the buffered bytes to the threshold;
    /// a failed flush is returned and the ops stay pending.
    ///
    /// # Panics
    ///
    /// Panics if the store is location-ordered and `key` is not 8 bytes.
    pub fn put<'k, 'v>(
        &mut self,
        key: impl Into<ByteView<'k>>,
        value: impl Into<ByteView<'v>>,
    ) -> CoreResult<usize> {
        let (key, value): (ByteView<'_>, ByteView<'_>) = (key.into(), value.into());
        self.db.ordering().check_key(key.data());
        self.pending.put(key, value);
        self.pending_bytes += value.size();
        if self.pending_bytes >= self.threshold {
            self.flush()?;
        }
        Ok(value.size())
    }

    /// Buffers a remove. Does not count toward the threshold.
    ///
    /// # Panics
    ///
    /// Panics if the store is location-ordered and `key` is not 8 bytes.
    pub fn remove<'k>(&mut self, key: impl Into<ByteView<'k>>) {
        let key: ByteView<'_> = key.into();
        self.db.ordering().check_key(key.data());
        self.pending.delete(key);
    }

    /// Applies everything pending as one write.
    ///
    /// Returns the value bytes flushed by this call, 0 if nothing was
    /// pending.
    pub fn flush(&mut self) -> CoreResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        self.db.write(&self.pending)?;

        let flushed = self.pending_bytes;
        tracing::debug!(
            ops = self.pending.len(),
            bytes = flushed,
            "flushed batch"
        );
        self.pending.clear();
        self.total += flushed;
        self.pending_bytes = 0;
        Ok(flushed)
    }

    /// Value bytes flushed over this batch's lifetime.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Value bytes buffered since the last flush.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Operations buffered since the last flush.
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.pending.len()
    }

    /// The auto-flush threshold in bytes.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::error!(
                error = %err,
                lost_ops = self.pending.len(),
                "failed to flush batch on drop"
            );
        }
    }
}

impl std::fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("pending_ops", &self.pending.len())
            .field("pending_bytes", &self.pending_bytes)
            .field("total", &self.total)
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Flags, BATCH_THRESHOLD};
    use crate::error::CoreError;
    use crate::scoped::ReadWriteLock;

    fn log_writes(db: &Database) -> u64 {
        db.stats().log_writes()
    }

    #[test]
    fn default_threshold_comes_from_config() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);
        assert_eq!(Batch::new(&scope).threshold(), BATCH_THRESHOLD);
        drop(scope);

        let db = Database::open_with_backend(
            Box::new(xrefdb_storage::InMemoryBackend::new()),
            Config::new().batch_threshold(64),
        );
        let scope = ScopedDb::write(&db, &lock);
        assert_eq!(Batch::new(&scope).threshold(), 64);
    }

    #[test]
    #[should_panic(expected = "Batch requires a write-locked ScopedDb")]
    fn read_scope_is_rejected() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::read(&db, &lock);
        let _batch = Batch::new(&scope);
    }

    #[test]
    #[should_panic(expected = "exactly 8 bytes")]
    fn short_location_key_panics_at_put() {
        let db = Database::open_in_memory(Flags::LOCATION_KEYS);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);
        let mut batch = Batch::new(&scope);
        let _ = batch.put(b"short", b"v");
    }

    #[test]
    #[should_panic(expected = "exactly 8 bytes")]
    fn short_location_key_panics_at_remove() {
        let db = Database::open_in_memory(Flags::LOCATION_KEYS);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);
        let mut batch = Batch::new(&scope);
        batch.remove(b"short");
    }

    #[test]
    fn below_threshold_writes_once_on_drop() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        {
            let mut batch = Batch::with_threshold(&scope, 100);
            for i in 0..5u8 {
                assert_eq!(batch.put([i].as_slice(), [0u8; 10].as_slice()).unwrap(), 10);
            }
            assert_eq!(batch.pending_bytes(), 50);
            assert_eq!(log_writes(&db), 0);
            assert!(!db.contains([0u8].as_slice()).unwrap());
        }

        assert_eq!(log_writes(&db), 1);
        assert_eq!(db.stats().writes(), 5);
        for i in 0..5u8 {
            assert!(db.contains([i].as_slice()).unwrap());
        }
    }

    #[test]
    fn crossing_threshold_flushes_mid_sequence() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        {
            let mut batch = Batch::with_threshold(&scope, 25);
            batch.put(b"a", &[0u8; 10]).unwrap();
            batch.put(b"b", &[0u8; 10]).unwrap();
            assert_eq!(log_writes(&db), 0);

            batch.put(b"c", &[0u8; 10]).unwrap();
            assert_eq!(log_writes(&db), 1);
            assert_eq!(batch.pending_bytes(), 0);
            assert_eq!(batch.total(), 30);
            assert!(db.contains(b"c").unwrap());

            batch.put(b"d", &[0u8; 10]).unwrap();
            assert_eq!(batch.pending_bytes(), 10);
        }

        assert_eq!(log_writes(&db), 2);
        assert!(db.contains(b"d").unwrap());
    }

    #[test]
    fn exact_threshold_triggers_flush() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        let mut batch = Batch::with_threshold(&scope, 8);
        batch.put(b"k", b"12345678").unwrap();
        assert_eq!(batch.pending_ops(), 0);
        assert_eq!(log_writes(&db), 1);
    }

    #[test]
    fn removes_do_not_count_toward_threshold() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);
        db.put(b"doomed", b"x").unwrap();
        let before = log_writes(&db);

        let mut batch = Batch::with_threshold(&scope, 4);
        for _ in 0..100 {
            batch.remove(b"some-rather-long-key-that-would-cross-any-threshold");
        }
        batch.remove(b"doomed");
        assert_eq!(batch.pending_bytes(), 0);
        assert_eq!(batch.pending_ops(), 101);
        assert_eq!(log_writes(&db), before);

        // Pending removes are still applied by an explicit flush.
        assert_eq!(batch.flush().unwrap(), 0);
        assert_eq!(log_writes(&db), before + 1);
        assert!(!db.contains(b"doomed").unwrap());
    }

    #[test]
    fn flush_of_empty_batch_is_a_no_op() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        let mut batch = Batch::new(&scope);
        assert_eq!(batch.flush().unwrap(), 0);
        drop(batch);
        assert_eq!(log_writes(&db), 0);
    }

    #[test]
    fn flush_reports_bytes_and_accumulates_total() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        let mut batch = Batch::new(&scope);
        batch.put(b"a", b"abc").unwrap();
        assert_eq!(batch.flush().unwrap(), 3);
        batch.put(b"b", b"de").unwrap();
        assert_eq!(batch.flush().unwrap(), 2);
        assert_eq!(batch.total(), 5);
        assert_eq!(batch.flush().unwrap(), 0);
    }

    #[test]
    fn later_ops_win_within_a_flush() {
        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        {
            let mut batch = Batch::new(&scope);
            batch.put(b"k", b"first").unwrap();
            batch.remove(b"k");
            batch.put(b"j", b"one").unwrap();
            batch.put(b"j", b"two").unwrap();
        }

        assert!(!db.contains(b"k").unwrap());
        assert_eq!(db.get(b"j").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn flush_error_is_surfaced() {
        let temp = tempfile::tempdir().unwrap();
        let mut db = Database::open(temp.path(), 0, Flags::NONE);
        db.close();
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);

        let mut batch = Batch::new(&scope);
        batch.put(b"k", b"v").unwrap();
        assert!(matches!(batch.flush(), Err(CoreError::NotOpened)));
        assert_eq!(batch.pending_ops(), 1);
        assert_eq!(batch.total(), 0);
    }

    #[test]
    fn drop_inside_early_return_flushes() {
        fn index_file(scope: &ScopedDb<'_>, fail: bool) -> Result<(), &'static str> {
            let mut batch = Batch::new(scope);
            batch.put(b"sym", b"loc").map_err(|_| "put")?;
            if fail {
                return Err("parser gave up");
            }
            Ok(())
        }

        let db = Database::open_in_memory(Flags::NONE);
        let lock = ReadWriteLock::new(());
        let scope = ScopedDb::write(&db, &lock);
        assert!(index_file(&scope, true).is_err());
        assert!(db.contains(b"sym").unwrap());
    }
}
