//! Ordered traversal.

use crate::engine::{Engine, IndexKey, KeyIndex, ValuePointer};
use crate::error::CoreError;
use crate::view::ByteView;
use std::sync::Arc;

/// A positionable cursor over a store's keys, in the store's ordering.
///
/// A new cursor is unpositioned (`is_valid() == false`) until one of the
/// `seek*` methods is called. Moving past either end leaves it invalid; it
/// stays invalid until repositioned with a `seek*` call.
///
/// Views from [`Cursor::key`] and [`Cursor::value`] borrow the cursor, so the
/// borrow checker rejects any use after the next move:
///
/// ```compile_fail
/// use xrefdb_core::{Database, Flags};
///
/// let db = Database::open_in_memory(Flags::NONE);
/// db.put(b"a", b"1").unwrap();
/// let mut cursor = db.create_cursor().unwrap();
/// cursor.seek_to_first();
/// let key = cursor.key();
/// cursor.next();
/// assert_eq!(key, b"a");
/// ```
pub struct Cursor<'db> {
    engine: &'db Engine,
    snapshot: Arc<KeyIndex>,
    current: Option<(IndexKey, Arc<[u8]>)>,
    status: Option<CoreError>,
}

impl<'db> Cursor<'db> {
    pub(crate) fn new(engine: &'db Engine) -> Self {
        Self {
            snapshot: engine.snapshot(),
            engine,
            current: None,
            status: None,
        }
    }

    /// Positions on the smallest key.
    pub fn seek_to_first(&mut self) {
        let entry = to_owned(self.snapshot.first());
        self.load(entry);
    }

    /// Positions on the largest key.
    pub fn seek_to_last(&mut self) {
        let entry = to_owned(self.snapshot.last());
        self.load(entry);
    }

    /// Positions on the first key at or after `target`.
    ///
    /// # Panics
    ///
    /// Under [`crate::KeyOrdering::Location`], panics if `target` is not
    /// 8 bytes.
    pub fn seek<'k>(&mut self, target: impl Into<ByteView<'k>>) {
        let target: ByteView<'_> = target.into();
        let entry = to_owned(self.snapshot.seek(target.data()));
        self.load(entry);
    }

    /// True iff positioned on an entry.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    /// Moves to the next key. Does nothing on an invalid cursor.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) {
        if let Some((key, _)) = &self.current {
            let entry = to_owned(self.snapshot.after(key));
            self.load(entry);
        }
    }

    /// Moves to the previous key. Does nothing on an invalid cursor.
    pub fn previous(&mut self) {
        if let Some((key, _)) = &self.current {
            let entry = to_owned(self.snapshot.before(key));
            self.load(entry);
        }
    }

    /// The current key.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not valid.
    #[must_use]
    pub fn key(&self) -> ByteView<'_> {
        let Some((key, _)) = &self.current else {
            panic!("cursor is not valid");
        };
        ByteView::new(key.bytes())
    }

    /// The current value.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is not valid.
    #[must_use]
    pub fn value(&self) -> ByteView<'_> {
        let Some((_, value)) = &self.current else {
            panic!("cursor is not valid");
        };
        ByteView::new(value)
    }

    /// The error that invalidated the cursor, if any.
    #[must_use]
    pub fn status(&self) -> Option<&CoreError> {
        self.status.as_ref()
    }

    fn load(&mut self, entry: Option<(IndexKey, ValuePointer)>) {
        self.status = None;
        self.current = match entry {
            Some((key, pointer)) => match self.engine.read_value(pointer) {
                Ok(value) => Some((key, value)),
                Err(err) => {
                    tracing::warn!(error = %err, "cursor failed to load value");
                    self.status = Some(err);
                    None
                }
            },
            None => None,
        };
    }
}

fn to_owned(entry: Option<(&IndexKey, &ValuePointer)>) -> Option<(IndexKey, ValuePointer)> {
    entry.map(|(key, pointer)| (key.clone(), *pointer))
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Cursor");
        match &self.current {
            Some((key, _)) => s.field("key", &ByteView::new(key.bytes())),
            None => s.field("key", &None::<()>),
        };
        s.field("status", &self.status).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, Flags};
    use crate::database::Database;
    use crate::location::LocationKey;
    use xrefdb_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};

    fn store(keys: &[&str]) -> Database {
        let db = Database::open_in_memory(Flags::NONE);
        for key in keys {
            db.put(*key, format!("v-{key}").as_str()).unwrap();
        }
        db
    }

    fn forward(db: &Database) -> Vec<String> {
        let mut cursor = db.create_cursor().unwrap();
        let mut keys = Vec::new();
        cursor.seek_to_first();
        while cursor.is_valid() {
            keys.push(String::from_utf8(cursor.key().to_vec()).unwrap());
            cursor.next();
        }
        keys
    }

    #[test]
    fn new_cursor_is_unpositioned() {
        let db = store(&["a"]);
        let cursor = db.create_cursor().unwrap();
        assert!(!cursor.is_valid());
        assert!(cursor.status().is_none());
    }

    #[test]
    fn forward_and_backward() {
        let db = store(&["k2", "k3", "k1"]);
        assert_eq!(forward(&db), vec!["k1", "k2", "k3"]);

        let mut cursor = db.create_cursor().unwrap();
        let mut keys = Vec::new();
        cursor.seek_to_last();
        while cursor.is_valid() {
            keys.push(cursor.key().to_vec());
            cursor.previous();
        }
        assert_eq!(keys, vec![b"k3".to_vec(), b"k2".to_vec(), b"k1".to_vec()]);
    }

    #[test]
    fn values_follow_keys() {
        let db = store(&["x", "y"]);
        let mut cursor = db.create_cursor().unwrap();
        cursor.seek_to_first();
        assert_eq!(cursor.value(), b"v-x");
        cursor.next();
        assert_eq!(cursor.value(), b"v-y");
    }

    #[test]
    fn seek_finds_first_at_or_after() {
        let db = store(&["b", "d", "f"]);
        let mut cursor = db.create_cursor().unwrap();

        cursor.seek("d");
        assert_eq!(cursor.key(), b"d");
        cursor.seek("c");
        assert_eq!(cursor.key(), b"d");
        cursor.seek("");
        assert_eq!(cursor.key(), b"b");
        cursor.seek("g");
        assert!(!cursor.is_valid());
    }

    #[test]
    fn invalid_stays_invalid_until_reseek() {
        let db = store(&["a", "b"]);
        let mut cursor = db.create_cursor().unwrap();

        cursor.seek_to_last();
        cursor.next();
        assert!(!cursor.is_valid());
        cursor.next();
        cursor.previous();
        assert!(!cursor.is_valid());

        cursor.seek_to_first();
        cursor.previous();
        assert!(!cursor.is_valid());

        cursor.seek_to_first();
        assert_eq!(cursor.key(), b"a");
    }

    #[test]
    fn empty_store_has_no_entries() {
        let db = store(&[]);
        let mut cursor = db.create_cursor().unwrap();
        cursor.seek_to_first();
        assert!(!cursor.is_valid());
        cursor.seek_to_last();
        assert!(!cursor.is_valid());
    }

    #[test]
    #[should_panic(expected = "cursor is not valid")]
    fn key_on_invalid_cursor_panics() {
        let db = store(&[]);
        let cursor = db.create_cursor().unwrap();
        let _ = cursor.key();
    }

    #[test]
    fn cursor_reads_a_snapshot() {
        let db = store(&["a", "c"]);
        let mut cursor = db.create_cursor().unwrap();

        db.put("b", "late").unwrap();
        db.remove("c").unwrap();

        cursor.seek_to_first();
        cursor.next();
        assert_eq!(cursor.key(), b"c");
        assert_eq!(cursor.value(), b"v-c");
        assert_eq!(forward(&db), vec!["a", "b"]);
    }

    #[test]
    fn location_scan_of_one_file() {
        let db = Database::open_in_memory(Flags::LOCATION_KEYS);
        for (f, o) in [(2, 10), (3, 300), (3, 7), (4, 0), (3, 256)] {
            db.put(&LocationKey::new(f, o).encode(), format!("{f}:{o}").as_str())
                .unwrap();
        }

        let mut cursor = db.create_cursor().unwrap();
        let mut seen = Vec::new();
        cursor.seek(&LocationKey::file_start(3).encode());
        while cursor.is_valid() {
            let key = LocationKey::decode(&cursor.key()).unwrap();
            if key.file_id != 3 {
                break;
            }
            seen.push(key.offset);
            cursor.next();
        }
        assert_eq!(seen, vec![7, 256, 300]);
    }

    /// A log device whose reads start failing once `fail` is set.
    #[derive(Clone)]
    struct FlakyBackend {
        inner: InMemoryBackend,
        fail: std::sync::Arc<std::sync::atomic::AtomicBool>,
    }

    impl StorageBackend for FlakyBackend {
        fn read_into(&self, offset: u64, buf: &mut [u8]) -> StorageResult<()> {
            if self.fail.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk gone",
                )));
            }
            self.inner.read_into(offset, buf)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.inner.truncate(new_size)
        }
    }

    #[test]
    fn read_failure_invalidates_and_reports() {
        let backend = FlakyBackend {
            inner: InMemoryBackend::new(),
            fail: Default::default(),
        };
        let fail = std::sync::Arc::clone(&backend.fail);
        let db = Database::open_with_backend(Box::new(backend), Config::new());
        db.put("k", "v").unwrap();

        fail.store(true, std::sync::atomic::Ordering::Relaxed);
        let mut cursor = db.create_cursor().unwrap();
        cursor.seek_to_first();
        assert!(!cursor.is_valid());
        assert!(cursor.status().is_some());
        assert!(db.get("k").is_err());

        fail.store(false, std::sync::atomic::Ordering::Relaxed);
        cursor.seek_to_first();
        assert!(cursor.is_valid());
        assert!(cursor.status().is_none());
    }
}
