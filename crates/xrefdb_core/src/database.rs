//! The database handle.

use crate::config::{Config, Flags};
use crate::cursor::Cursor;
use crate::engine::{CompactionResult, Engine, WriteSet};
use crate::error::{CoreError, CoreResult};
use crate::ordering::KeyOrdering;
use crate::stats::StorageStats;
use crate::view::ByteView;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xrefdb_storage::{InMemoryBackend, StorageBackend};

/// A handle to one ordered store.
///
/// Opening never fails loudly: a handle whose open failed reports
/// [`Database::is_opened`] as false, keeps the reason in
/// [`Database::open_error`], and answers every operation with
/// [`CoreError::NotOpened`]. Build a new handle to try again.
///
/// # Concurrency
///
/// `Database` is `Send + Sync` and keeps its own internals consistent, but
/// it does not serialise writers. Callers take a [`crate::ScopedDb`] from a
/// shared [`crate::ReadWriteLock`] first.
///
/// # Example
///
/// ```rust
/// use xrefdb_core::{Database, Flags, LocationKey};
///
/// let temp = tempfile::tempdir().unwrap();
/// let db = Database::open(temp.path(), 0, Flags::LOCATION_KEYS);
/// assert!(db.is_opened(), "{:?}", db.open_error());
///
/// db.put(&LocationKey::new(3, 100).encode(), b"sym1").unwrap();
/// db.put(&LocationKey::new(3, 50).encode(), b"sym2").unwrap();
///
/// let mut cursor = db.create_cursor().unwrap();
/// cursor.seek_to_first();
/// assert_eq!(cursor.value(), b"sym2");
/// ```
pub struct Database {
    config: Config,
    ordering: KeyOrdering,
    path: Option<PathBuf>,
    open_error: Option<String>,
    engine: Option<Engine>,
    stats: Arc<StorageStats>,
}

impl Database {
    /// Opens or creates the store at `path`.
    ///
    /// `cache_size_mb` sizes the value cache (0 disables it) and `flags`
    /// selects the key ordering. Check [`Self::is_opened`] afterwards.
    pub fn open(path: impl AsRef<Path>, cache_size_mb: usize, flags: Flags) -> Self {
        Self::open_with_config(
            path,
            Config::new().cache_size_mb(cache_size_mb).flags(flags),
        )
    }

    /// Opens or creates the store at `path` with a full configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Self {
        let path = path.as_ref();
        let stats = Arc::new(StorageStats::new());
        let result = Engine::open_dir(path, &config, Arc::clone(&stats));
        Self::from_open_result(result, Some(path.to_path_buf()), config, stats)
    }

    /// Opens a store over an existing log device, without a directory,
    /// lock or manifest.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, config: Config) -> Self {
        let stats = Arc::new(StorageStats::new());
        let result = Engine::open_backend(None, backend, &config, Arc::clone(&stats));
        Self::from_open_result(result, None, config, stats)
    }

    /// Opens a fresh store that lives only in memory.
    pub fn open_in_memory(flags: Flags) -> Self {
        Self::open_with_backend(
            Box::new(InMemoryBackend::new()),
            Config::new().flags(flags),
        )
    }

    fn from_open_result(
        result: CoreResult<Engine>,
        path: Option<PathBuf>,
        config: Config,
        stats: Arc<StorageStats>,
    ) -> Self {
        let ordering = KeyOrdering::from_flags(config.flags);
        match result {
            Ok(engine) => {
                tracing::info!(
                    path = ?path,
                    ordering = ordering.name(),
                    cache_size_mb = config.cache_size_mb,
                    "opened database"
                );
                Self {
                    config,
                    ordering,
                    path,
                    open_error: None,
                    engine: Some(engine),
                    stats,
                }
            }
            Err(err) => {
                tracing::warn!(path = ?path, error = %err, "failed to open database");
                Self {
                    config,
                    ordering,
                    path: None,
                    open_error: Some(err.to_string()),
                    engine: None,
                    stats,
                }
            }
        }
    }

    fn engine(&self) -> CoreResult<&Engine> {
        self.engine.as_ref().ok_or(CoreError::NotOpened)
    }

    /// True iff the open succeeded and [`Self::close`] hasn't been called.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        self.engine.is_some()
    }

    /// Why the open failed, if it did.
    #[must_use]
    pub fn open_error(&self) -> Option<&str> {
        self.open_error.as_deref()
    }

    /// The store directory, once opened from a path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The installed key ordering.
    #[must_use]
    pub fn ordering(&self) -> KeyOrdering {
        self.ordering
    }

    /// The configuration this handle was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Operation counters for this handle.
    #[must_use]
    pub fn stats(&self) -> &StorageStats {
        &self.stats
    }

    /// Looks up `key`.
    ///
    /// Returns `Ok(None)` when the key is absent. Failing to read a present
    /// value is an error, not a miss.
    pub fn get<'k>(&self, key: impl Into<ByteView<'k>>) -> CoreResult<Option<Vec<u8>>> {
        let engine = self.engine()?;
        let key: ByteView<'_> = key.into();
        Ok(engine.get(key.data())?.map(|value| value.to_vec()))
    }

    /// Returns true if `key` is present.
    pub fn contains<'k>(&self, key: impl Into<ByteView<'k>>) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// Returns the number of value bytes written.
    ///
    /// # Panics
    ///
    /// Under [`KeyOrdering::Location`], panics if `key` is not 8 bytes.
    pub fn put<'k, 'v>(
        &self,
        key: impl Into<ByteView<'k>>,
        value: impl Into<ByteView<'v>>,
    ) -> CoreResult<usize> {
        let engine = self.engine()?;
        let (key, value): (ByteView<'_>, ByteView<'_>) = (key.into(), value.into());
        let mut set = WriteSet::new();
        set.put(key, value);
        engine.write(&set)?;
        Ok(value.size())
    }

    /// Removes `key`. Removing an absent key succeeds.
    ///
    /// # Panics
    ///
    /// Under [`KeyOrdering::Location`], panics if `key` is not 8 bytes.
    pub fn remove<'k>(&self, key: impl Into<ByteView<'k>>) -> CoreResult<()> {
        let engine = self.engine()?;
        let key: ByteView<'_> = key.into();
        let mut set = WriteSet::new();
        set.delete(key);
        engine.write(&set)
    }

    /// Applies every operation in `set` as one atomic write.
    pub fn write(&self, set: &WriteSet) -> CoreResult<()> {
        self.engine()?.write(set)
    }

    /// Creates a cursor over the whole keyspace.
    ///
    /// The cursor sees the store as of this call; later writes don't move
    /// under it.
    pub fn create_cursor(&self) -> CoreResult<Cursor<'_>> {
        Ok(Cursor::new(self.engine()?))
    }

    /// Forces everything written so far to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.engine()?.sync()
    }

    /// Current size of the record log in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.engine()?.log_size()
    }

    /// Rewrites the record log so it holds only live values.
    pub fn compact(&mut self) -> CoreResult<CompactionResult> {
        self.engine
            .as_mut()
            .ok_or(CoreError::NotOpened)?
            .compact()
    }

    /// Releases the engine and the directory lock.
    ///
    /// Idempotent. The handle stays inert afterwards; open a new one to use
    /// the store again.
    pub fn close(&mut self) {
        if let Some(engine) = self.engine.take() {
            if let Err(err) = engine.sync() {
                tracing::warn!(error = %err, "sync on close failed");
            }
            tracing::info!(path = ?self.path, "closed database");
        }
        self.open_error = None;
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("ordering", &self.ordering)
            .field("opened", &self.is_opened())
            .field("open_error", &self.open_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationKey;
    use tempfile::tempdir;

    fn loc(file_id: u32, offset: u32) -> [u8; 8] {
        LocationKey::new(file_id, offset).encode()
    }

    #[test]
    fn point_round_trip() {
        let db = Database::open_in_memory(Flags::NONE);
        assert!(db.is_opened());

        assert_eq!(db.put(b"fn main", b"src/main.rs:1").unwrap(), 13);
        assert_eq!(db.get(b"fn main").unwrap(), Some(b"src/main.rs:1".to_vec()));
        assert!(db.contains("fn main").unwrap());
        assert!(!db.contains("fn other").unwrap());
    }

    #[test]
    fn overwrite_replaces_value() {
        let db = Database::open_in_memory(Flags::NONE);
        db.put(b"k", b"old").unwrap();
        db.put(b"k", b"new").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn remove_then_get_misses() {
        let db = Database::open_in_memory(Flags::NONE);
        db.put(b"k", b"v").unwrap();
        db.remove(b"k").unwrap();
        assert_eq!(db.get(b"k").unwrap(), None);

        // Absent keys remove cleanly.
        db.remove(b"never-there").unwrap();
    }

    #[test]
    fn empty_values_are_present() {
        let db = Database::open_in_memory(Flags::NONE);
        db.put(b"k", b"").unwrap();
        assert_eq!(db.get(b"k").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn open_creates_missing_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index").join("symbols");
        let db = Database::open(&path, 0, Flags::NONE);

        assert!(db.is_opened(), "{:?}", db.open_error());
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.join("MANIFEST").exists());
        assert!(path.join("data.log").exists());
    }

    #[test]
    fn failed_open_records_error() {
        let temp = tempdir().unwrap();
        let config = Config::new().create_if_missing(false);
        let db = Database::open_with_config(temp.path().join("missing"), config);

        assert!(!db.is_opened());
        assert!(db.open_error().unwrap().contains("does not exist"));
        assert_eq!(db.path(), None);
    }

    #[test]
    fn unopened_handle_rejects_everything() {
        let temp = tempdir().unwrap();
        let _holder = Database::open(temp.path(), 0, Flags::NONE);
        let mut db = Database::open(temp.path(), 0, Flags::NONE);

        assert!(!db.is_opened());
        assert!(db.open_error().unwrap().contains("locked"));
        assert!(matches!(db.get(b"k"), Err(CoreError::NotOpened)));
        assert!(matches!(db.contains(b"k"), Err(CoreError::NotOpened)));
        assert!(matches!(db.put(b"k", b"v"), Err(CoreError::NotOpened)));
        assert!(matches!(db.remove(b"k"), Err(CoreError::NotOpened)));
        assert!(matches!(db.write(&WriteSet::new()), Err(CoreError::NotOpened)));
        assert!(matches!(db.create_cursor(), Err(CoreError::NotOpened)));
        assert!(matches!(db.sync(), Err(CoreError::NotOpened)));
        assert!(matches!(db.compact(), Err(CoreError::NotOpened)));
    }

    #[test]
    fn close_is_idempotent_and_releases_lock() {
        let temp = tempdir().unwrap();
        let mut db = Database::open(temp.path(), 0, Flags::NONE);
        db.put(b"k", b"v").unwrap();

        db.close();
        db.close();
        assert!(!db.is_opened());
        assert!(db.open_error().is_none());
        assert!(matches!(db.get(b"k"), Err(CoreError::NotOpened)));

        let reopened = Database::open(temp.path(), 0, Flags::NONE);
        assert_eq!(reopened.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn close_clears_open_error() {
        let temp = tempdir().unwrap();
        let _holder = Database::open(temp.path(), 0, Flags::NONE);
        let mut db = Database::open(temp.path(), 0, Flags::NONE);
        assert!(db.open_error().is_some());

        db.close();
        assert!(db.open_error().is_none());
        assert!(!db.is_opened());
    }

    #[test]
    fn location_keys_persist_in_order() {
        let temp = tempdir().unwrap();
        {
            let mut db = Database::open(temp.path(), 0, Flags::LOCATION_KEYS);
            db.put(&loc(3, 100), b"sym1").unwrap();
            db.put(&loc(3, 50), b"sym2").unwrap();
            db.close();
        }

        let db = Database::open(temp.path(), 0, Flags::LOCATION_KEYS);
        assert!(db.is_opened(), "{:?}", db.open_error());
        assert_eq!(db.ordering(), KeyOrdering::Location);

        let mut cursor = db.create_cursor().unwrap();
        cursor.seek_to_first();
        assert_eq!(cursor.key(), &loc(3, 50));
        assert_eq!(cursor.value(), b"sym2");
        cursor.next();
        assert_eq!(cursor.key(), &loc(3, 100));
        assert_eq!(cursor.value(), b"sym1");
        cursor.next();
        assert!(!cursor.is_valid());
    }

    #[test]
    fn reopen_with_other_ordering_fails() {
        let temp = tempdir().unwrap();
        drop(Database::open(temp.path(), 0, Flags::LOCATION_KEYS));

        let db = Database::open(temp.path(), 0, Flags::NONE);
        assert!(!db.is_opened());
        let message = db.open_error().unwrap();
        assert!(message.contains("LocationComparator"), "{message}");
    }

    #[test]
    #[should_panic(expected = "exactly 8 bytes")]
    fn location_store_panics_on_short_key() {
        let db = Database::open_in_memory(Flags::LOCATION_KEYS);
        let _ = db.put(b"short", b"v");
    }

    #[test]
    fn cache_is_attached_when_sized() {
        let temp = tempdir().unwrap();
        let db = Database::open(temp.path(), 4, Flags::NONE);
        db.put(b"k", b"value").unwrap();

        db.get(b"k").unwrap();
        db.get(b"k").unwrap();
        let stats = db.stats().snapshot();
        assert_eq!(stats.reads, 2);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[test]
    fn compact_keeps_contents() {
        let mut db = Database::open_in_memory(Flags::NONE);
        for i in 0..20u32 {
            db.put(b"churn", &i.to_le_bytes()).unwrap();
        }
        db.put(b"stable", b"s").unwrap();
        let before = db.log_size().unwrap();

        let result = db.compact().unwrap();
        assert_eq!(result.live_entries, 2);
        assert_eq!(result.bytes_before, before);
        assert_eq!(db.log_size().unwrap(), result.bytes_after);
        assert_eq!(db.get(b"churn").unwrap(), Some(19u32.to_le_bytes().to_vec()));
        assert_eq!(db.stats().compactions(), 1);
    }

    #[test]
    fn reopen_over_shared_backend() {
        let backend = InMemoryBackend::new();
        {
            let db = Database::open_with_backend(Box::new(backend.clone()), Config::new());
            db.put(b"k", b"v").unwrap();
        }
        let db = Database::open_with_backend(Box::new(backend), Config::new());
        assert_eq!(db.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn corrupt_log_fails_open() {
        let backend = InMemoryBackend::new();
        {
            let db = Database::open_with_backend(Box::new(backend.clone()), Config::new());
            db.put(b"key", b"value").unwrap();
        }
        backend.overwrite(0, b"BAD!").unwrap();

        let db = Database::open_with_backend(Box::new(backend), Config::new());
        assert!(!db.is_opened());
        assert!(db.open_error().unwrap().contains("corruption"));
    }

    #[test]
    fn database_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Database>();
    }
}
