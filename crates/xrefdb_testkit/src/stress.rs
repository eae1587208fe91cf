//! Stress runs for xrefdb.
//!
//! These helpers drive one writer and several readers through a
//! [`SharedDatabase`] at once and check that readers only ever observe
//! sorted, internally consistent snapshots.

use crate::fixtures::loc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use xrefdb_core::{Batch, KeyOrdering, LocationKey, SharedDatabase};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressResult {
    /// Symbols written by the writer.
    pub symbols_written: usize,
    /// Full cursor scans completed by readers.
    pub scans: usize,
    /// Scans that saw keys out of order or mismatched values.
    pub violations: usize,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

impl StressResult {
    /// True if no reader saw an inconsistent snapshot.
    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Reader threads.
    pub readers: usize,
    /// Files the writer indexes.
    pub files: u32,
    /// Symbols per file.
    pub symbols_per_file: u32,
    /// Batch flush threshold used by the writer.
    pub batch_threshold: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            readers: 4,
            files: 20,
            symbols_per_file: 50,
            batch_threshold: 4 * 1024,
        }
    }
}

/// Value the writer stores for a symbol: its own location, so readers can
/// check each value against its key.
fn symbol_value(key: LocationKey) -> Vec<u8> {
    key.to_string().into_bytes()
}

/// Indexes `config.files` files, one write scope per file, while readers scan.
///
/// `shared` must be a location-keyed store.
pub fn index_while_scanning(shared: &Arc<SharedDatabase>, config: &StressConfig) -> StressResult {
    let done = Arc::new(AtomicBool::new(false));
    let scans = Arc::new(AtomicUsize::new(0));
    let violations = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let readers: Vec<_> = (0..config.readers)
        .map(|_| {
            let shared = Arc::clone(shared);
            let done = Arc::clone(&done);
            let scans = Arc::clone(&scans);
            let violations = Arc::clone(&violations);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    if !scan_is_consistent(&shared) {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    scans.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let mut symbols_written = 0;
    for file_id in 0..config.files {
        let scope = shared.write();
        let mut batch = Batch::with_threshold(&scope, config.batch_threshold);
        for offset in (0..config.symbols_per_file).rev() {
            let key = LocationKey::new(file_id, offset * 8);
            batch
                .put(&key.encode(), symbol_value(key).as_slice())
                .expect("Failed to put symbol");
            symbols_written += 1;
        }
    }

    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().expect("Reader panicked");
    }

    StressResult {
        symbols_written,
        scans: scans.load(Ordering::Relaxed),
        violations: violations.load(Ordering::Relaxed),
        duration: start.elapsed(),
    }
}

fn scan_is_consistent(shared: &SharedDatabase) -> bool {
    let scope = shared.read();
    let Ok(mut cursor) = scope.create_cursor() else {
        return false;
    };

    let mut previous: Option<Vec<u8>> = None;
    cursor.seek_to_first();
    while cursor.is_valid() {
        let key = cursor.key();
        if let Some(prev) = &previous {
            if KeyOrdering::Location.compare(prev, &key) != std::cmp::Ordering::Less {
                return false;
            }
        }
        let Ok(location) = LocationKey::decode(&key) else {
            return false;
        };
        if cursor.value() != symbol_value(location).as_slice() {
            return false;
        }
        previous = Some(key.to_vec());
        cursor.next();
    }
    true
}

/// Removes every symbol of `file_id` in one batch, as a re-index of a
/// deleted file would.
pub fn drop_file(shared: &SharedDatabase, file_id: u32) -> usize {
    let scope = shared.write();
    let mut doomed = Vec::new();
    {
        let mut cursor = scope.create_cursor().expect("Failed to create cursor");
        cursor.seek(&loc(file_id, 0));
        while cursor.is_valid() {
            let key = LocationKey::decode(&cursor.key()).expect("Location key");
            if key.file_id != file_id {
                break;
            }
            doomed.push(key);
            cursor.next();
        }
    }

    let mut batch = Batch::new(&scope);
    for key in &doomed {
        batch.remove(&key.encode());
    }
    batch.flush().expect("Failed to flush removals");
    doomed.len()
}
