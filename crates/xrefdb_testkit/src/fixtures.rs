//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use std::path::{Path, PathBuf};
use std::sync::Once;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use xrefdb_core::{Config, Database, Flags, LocationKey};

static TRACING: Once = Once::new();

/// Installs a test-friendly `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn` so torn-tail and flush failures
/// still show up in failing test output.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Encodes a location key; shorthand for tests.
pub fn loc(file_id: u32, offset: u32) -> [u8; 8] {
    LocationKey::new(file_id, offset).encode()
}

/// A file-backed store in a temporary directory, removed on drop.
pub struct TestStore {
    /// The database instance.
    pub db: Database,
    config: Config,
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates a fresh store opened with `flags`.
    pub fn new(flags: Flags) -> Self {
        Self::with_config(Config::new().flags(flags))
    }

    /// Creates a fresh store opened with `config`.
    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_with_config(temp_dir.path(), config.clone());
        assert!(db.is_opened(), "Failed to open store: {:?}", db.open_error());
        Self {
            db,
            config,
            temp_dir,
        }
    }

    /// The store directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the record log inside the store directory.
    pub fn log_path(&self) -> PathBuf {
        self.temp_dir.path().join("data.log")
    }

    /// The configuration the store is opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Closes the handle, releasing the directory lock, without reopening.
    pub fn close(&mut self) {
        self.db.close();
    }

    /// Closes and reopens the store with the same configuration.
    ///
    /// # Panics
    ///
    /// Panics if the reopen fails.
    pub fn reopen(&mut self) {
        self.db.close();
        self.db = Database::open_with_config(self.temp_dir.path(), self.config.clone());
        assert!(
            self.db.is_opened(),
            "Failed to reopen store: {:?}",
            self.db.open_error()
        );
    }

    /// Closes and opens the store again without asserting success.
    pub fn try_reopen(&mut self) -> &Database {
        self.db.close();
        self.db = Database::open_with_config(self.temp_dir.path(), self.config.clone());
        &self.db
    }
}

impl std::ops::Deref for TestStore {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

impl std::ops::DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.db
    }
}

/// Runs a test with a temporary in-memory store.
pub fn with_memory_db<F, R>(flags: Flags, f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    init_tracing();
    let db = Database::open_in_memory(flags);
    f(&db)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_db<F, R>(flags: Flags, f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let store = TestStore::new(flags);
    f(&store.db, store.path())
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Value stored for a synthetic symbol.
    pub fn symbol_name(file_id: u32, offset: u32) -> Vec<u8> {
        format!("sym_{file_id}_{offset}").into_bytes()
    }

    /// Fills `db` with `symbols_per_file` symbols in each of `files` files.
    ///
    /// Offsets are spaced 16 bytes apart and written in descending order so
    /// the store has to sort them.
    pub fn populate_locations(db: &Database, files: u32, symbols_per_file: u32) {
        for file_id in 0..files {
            for i in (0..symbols_per_file).rev() {
                let offset = i * 16;
                db.put(&loc(file_id, offset), symbol_name(file_id, offset).as_slice())
                    .expect("Failed to put symbol");
            }
        }
    }

    /// Creates a location-keyed store with pre-populated symbols.
    pub fn populated_location_store(files: u32, symbols_per_file: u32) -> TestStore {
        let store = TestStore::new(Flags::LOCATION_KEYS);
        populate_locations(&store.db, files, symbols_per_file);
        store
    }

    /// Collects every `(key, value)` pair by a forward cursor scan.
    pub fn scan_all(db: &Database) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut cursor = db.create_cursor().expect("Failed to create cursor");
        let mut out = Vec::new();
        cursor.seek_to_first();
        while cursor.is_valid() {
            out.push((cursor.key().to_vec(), cursor.value().to_vec()));
            cursor.next();
        }
        out
    }

    /// Collects the offsets of every symbol in `file_id`, in store order.
    pub fn offsets_in_file(db: &Database, file_id: u32) -> Vec<u32> {
        let mut cursor = db.create_cursor().expect("Failed to create cursor");
        let mut out = Vec::new();
        cursor.seek(&loc(file_id, 0));
        while cursor.is_valid() {
            let key = LocationKey::decode(&cursor.key()).expect("Location key");
            if key.file_id != file_id {
                break;
            }
            out.push(key.offset);
            cursor.next();
        }
        out
    }
}
