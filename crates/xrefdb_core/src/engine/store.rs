//! The ordered key-value engine.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::engine::cache::ValueCache;
use crate::engine::index::{KeyIndex, ValuePointer};
use crate::engine::log::{RecordLog, ReplayOp};
use crate::engine::record;
use crate::engine::write_set::{WriteOp, WriteSet};
use crate::error::CoreResult;
use crate::manifest::Manifest;
use crate::ordering::KeyOrdering;
use crate::stats::StorageStats;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use xrefdb_storage::{FileBackend, InMemoryBackend, StorageBackend};

/// Outcome of [`Engine::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Keys carried over.
    pub live_entries: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
}

impl CompactionResult {
    /// Bytes reclaimed.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Log-structured ordered store.
///
/// Writes append one record per [`WriteSet`] and then update the index.
/// The index lives behind `RwLock<Arc<_>>`: readers clone the `Arc` and
/// keep a stable snapshot, writers copy it only while a snapshot is held.
pub struct Engine {
    ordering: KeyOrdering,
    dir: Option<StoreDir>,
    log: RwLock<RecordLog>,
    index: RwLock<Arc<KeyIndex>>,
    cache: Option<Mutex<ValueCache>>,
    stats: Arc<StorageStats>,
}

impl Engine {
    /// Opens the store in the directory at `path`.
    ///
    /// Takes the directory lock, creates or validates the MANIFEST and
    /// replays the log.
    pub fn open_dir(
        path: &std::path::Path,
        config: &Config,
        stats: Arc<StorageStats>,
    ) -> CoreResult<Self> {
        let ordering = KeyOrdering::from_flags(config.flags);
        let dir = StoreDir::open(path, config.create_if_missing)?;

        if dir.remove_stale_compaction()? {
            tracing::warn!(path = %dir.path().display(), "removed leftover compaction file");
        }

        match dir.load_manifest()? {
            Some(manifest) => manifest.validate(ordering)?,
            None => dir.save_manifest(&Manifest::new(ordering))?,
        }

        let backend = FileBackend::open(&dir.log_path())?;
        Self::open_backend(Some(dir), Box::new(backend), config, stats)
    }

    /// Opens a store over an arbitrary log device, without a directory.
    pub fn open_backend(
        dir: Option<StoreDir>,
        backend: Box<dyn StorageBackend>,
        config: &Config,
        stats: Arc<StorageStats>,
    ) -> CoreResult<Self> {
        let ordering = KeyOrdering::from_flags(config.flags);
        let mut log = RecordLog::new(backend, config.sync_on_write);
        let index = replay(&mut log, ordering)?;

        let capacity = config.cache_capacity();
        let cache = (capacity > 0).then(|| Mutex::new(ValueCache::new(capacity)));

        Ok(Self {
            ordering,
            dir,
            log: RwLock::new(log),
            index: RwLock::new(Arc::new(index)),
            cache,
            stats,
        })
    }

    /// Returns the current index for traversal.
    pub fn snapshot(&self) -> Arc<KeyIndex> {
        Arc::clone(&self.index.read())
    }

    /// Looks up `key` and loads its value.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Arc<[u8]>>> {
        self.stats.record_read();
        let pointer = self.index.read().get(key);
        pointer.map(|p| self.read_value(p)).transpose()
    }

    /// Loads the value at `pointer`, through the cache when there is one.
    pub fn read_value(&self, pointer: ValuePointer) -> CoreResult<Arc<[u8]>> {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.lock().get(pointer.offset) {
                self.stats.record_cache_hit();
                return Ok(value);
            }
            self.stats.record_cache_miss();
        }

        let value: Arc<[u8]> = self
            .log
            .read()
            .read(pointer.offset, pointer.len as usize)?
            .into();
        self.stats.record_value_load(u64::from(pointer.len));

        if let Some(cache) = &self.cache {
            cache.lock().insert(pointer.offset, Arc::clone(&value));
        }
        Ok(value)
    }

    /// Applies `set` as one log record.
    ///
    /// # Panics
    ///
    /// Under [`KeyOrdering::Location`], panics before anything is written if
    /// any key is not exactly 8 bytes.
    pub fn write(&self, set: &WriteSet) -> CoreResult<()> {
        if set.is_empty() {
            return Ok(());
        }
        for op in set.ops() {
            self.ordering.check_key(op.key());
        }

        let encoded = record::encode(set)?;

        // Held across the index update so index order follows log order.
        let mut log = self.log.write();
        let offset = log.append(&encoded)?;

        {
            let mut guard = self.index.write();
            let index = Arc::make_mut(&mut guard);
            for (op, span) in set.ops().iter().zip(&encoded.spans) {
                match (op, span) {
                    (WriteOp::Put { key, .. }, Some(span)) => index.insert(
                        key,
                        ValuePointer {
                            offset: offset + span.start,
                            len: span.len,
                        },
                    ),
                    (op, _) => {
                        index.remove(op.key());
                    }
                }
            }
        }
        drop(log);

        let (puts, deletes) = set.counts();
        self.stats
            .record_log_write(puts, deletes, set.value_bytes() as u64);
        Ok(())
    }

    /// Forces the log to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.log.write().sync()
    }

    /// Log size in bytes.
    pub fn log_size(&self) -> CoreResult<u64> {
        self.log.read().size()
    }

    /// Rewrites the log keeping only live values.
    ///
    /// Taking `&mut self` guarantees no cursor is alive.
    pub fn compact(&mut self) -> CoreResult<CompactionResult> {
        let snapshot = self.snapshot();
        let log = self.log.get_mut();
        let bytes_before = log.size()?;

        let (bytes_after, index) = match &self.dir {
            Some(dir) => {
                dir.remove_stale_compaction()?;
                let target = FileBackend::open(&dir.compact_path())?;
                let mut fresh = RecordLog::new(Box::new(target), false);
                let index = copy_live(&snapshot, log, &mut fresh)?;
                fresh.sync()?;
                let bytes_after = fresh.size()?;

                // The compacted file stays open across the rename and becomes
                // the live log. Until the rename lands the old log is untouched.
                let compacted = fresh.replace_backend(Box::new(InMemoryBackend::new()));
                dir.install_compacted_log()?;
                log.replace_backend(compacted);

                (bytes_after, index)
            }
            None => {
                let mut fresh = RecordLog::new(Box::new(InMemoryBackend::new()), false);
                let index = copy_live(&snapshot, log, &mut fresh)?;
                let bytes_after = fresh.size()?;
                log.replace_backend(fresh.replace_backend(Box::new(InMemoryBackend::new())));
                (bytes_after, index)
            }
        };

        let live_entries = index.len();
        *self.index.get_mut() = Arc::new(index);
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
        self.stats.record_compaction();
        if let Some(dir) = &self.dir {
            dir.sync_directory()?;
        }

        let result = CompactionResult {
            live_entries,
            bytes_before,
            bytes_after,
        };
        tracing::info!(
            live_entries,
            bytes_before,
            bytes_after,
            "compacted record log"
        );
        Ok(result)
    }
}

/// Rebuilds the index from the log, dropping a torn tail.
fn replay(log: &mut RecordLog, ordering: KeyOrdering) -> CoreResult<KeyIndex> {
    let mut index = KeyIndex::new(ordering);
    let mut records = 0usize;

    let (valid_len, total_size) = {
        let mut iter = log.iter()?;
        for result in iter.by_ref() {
            let (_, ops) = result?;
            records += 1;
            for op in ops {
                match op {
                    ReplayOp::Put { key, offset, len } => {
                        index.insert(&key, ValuePointer { offset, len });
                    }
                    ReplayOp::Delete { key } => {
                        index.remove(&key);
                    }
                }
            }
        }
        (iter.valid_len(), iter.total_size())
    };

    if valid_len < total_size {
        tracing::warn!(
            valid_len,
            discarded = total_size - valid_len,
            "truncating torn record at log tail"
        );
        log.truncate(valid_len)?;
    }

    tracing::debug!(records, live_keys = index.len(), "replayed record log");
    Ok(index)
}

/// Writes every live value of `snapshot` from `from` into `to`.
fn copy_live(
    snapshot: &KeyIndex,
    from: &RecordLog,
    to: &mut RecordLog,
) -> CoreResult<KeyIndex> {
    let mut index = KeyIndex::new(snapshot.ordering());
    for (key, pointer) in snapshot.iter() {
        let value = from.read(pointer.offset, pointer.len as usize)?;
        let mut set = WriteSet::new();
        set.put(key.bytes(), value);
        let encoded = record::encode(&set)?;
        let offset = to.append(&encoded)?;
        if let Some(Some(span)) = encoded.spans.first() {
            index.insert(
                key.bytes(),
                ValuePointer {
                    offset: offset + span.start,
                    len: span.len,
                },
            );
        }
    }
    Ok(index)
}
