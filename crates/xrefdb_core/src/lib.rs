//! # xrefdb Core
//!
//! Ordered symbol storage for code indexers.
//!
//! A store maps byte keys to byte values and keeps the keys sorted under a
//! [`KeyOrdering`] chosen when the store is created. Stores opened with
//! [`Flags::LOCATION_KEYS`] hold 8-byte [`LocationKey`]s and sort them by
//! `(file_id, offset)`, so every symbol in one file is a contiguous range.
//!
//! This crate provides:
//! - [`ByteView`] - Zero-copy byte views for keys and values
//! - [`Database`] - Open, point reads and writes, compaction, close
//! - [`Cursor`] - Ordered, snapshot-stable traversal
//! - [`ScopedDb`] - Access under a held [`ReadWriteLock`]
//! - [`Batch`] - Size-triggered grouped writes under a write lock
//!
//! ## Storage
//!
//! Each store directory holds a `MANIFEST` naming its ordering, a `LOCK`
//! file, and `data.log`, an append-only log of checksummed records. The key
//! index lives in memory and is rebuilt from the log on open; a torn record
//! at the tail is cut off, any other damage fails the open.
//!
//! ## Example
//!
//! ```rust
//! use xrefdb_core::{Batch, Database, Flags, LocationKey, ReadWriteLock, ScopedDb};
//!
//! let db = Database::open_in_memory(Flags::LOCATION_KEYS);
//! let lock = ReadWriteLock::new(());
//!
//! {
//!     let scope = ScopedDb::write(&db, &lock);
//!     let mut batch = Batch::new(&scope);
//!     batch.put(&LocationKey::new(7, 120).encode(), b"fn parse").unwrap();
//!     batch.put(&LocationKey::new(7, 40).encode(), b"struct Lexer").unwrap();
//!     batch.put(&LocationKey::new(9, 0).encode(), b"mod tests").unwrap();
//! }
//!
//! let scope = ScopedDb::read(&db, &lock);
//! let mut cursor = scope.create_cursor().unwrap();
//! let mut in_file_7 = Vec::new();
//! cursor.seek(&LocationKey::file_start(7).encode());
//! while cursor.is_valid() {
//!     if LocationKey::decode(&cursor.key()).unwrap().file_id != 7 {
//!         break;
//!     }
//!     in_file_7.push(cursor.value().to_vec());
//!     cursor.next();
//! }
//! assert_eq!(in_file_7, vec![b"struct Lexer".to_vec(), b"fn parse".to_vec()]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod cursor;
mod database;
mod dir;
mod engine;
mod error;
mod location;
mod manifest;
mod ordering;
mod scoped;
mod stats;
mod view;

pub use batch::Batch;
pub use config::{Config, Flags, BATCH_THRESHOLD};
pub use cursor::Cursor;
pub use database::Database;
pub use engine::{CompactionResult, WriteOp, WriteSet};
pub use error::{CoreError, CoreResult};
pub use location::{LocationKey, LOCATION_KEY_SIZE};
pub use manifest::{Manifest, FORMAT_VERSION};
pub use ordering::KeyOrdering;
pub use scoped::{LockMode, ReadWriteLock, ScopedDb, SharedDatabase};
pub use stats::{StatsSnapshot, StorageStats};
pub use view::ByteView;
