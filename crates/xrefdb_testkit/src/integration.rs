//! Cross-module integration test helpers.
//!
//! [`ModelHarness`] applies operations to a store and to a plain
//! `BTreeMap` side by side, then checks that point reads and cursor scans
//! agree with the model.

use crate::generators::StoreOp;
use std::collections::BTreeMap;
use xrefdb_core::{Batch, Database, KeyOrdering, ReadWriteLock, ScopedDb};

/// A store paired with the contents it should have.
pub struct ModelHarness<'db> {
    db: &'db Database,
    model: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'db> ModelHarness<'db> {
    /// Wraps an empty store.
    ///
    /// # Panics
    ///
    /// Panics if the store already holds keys.
    pub fn new(db: &'db Database) -> Self {
        let mut cursor = db.create_cursor().expect("Failed to create cursor");
        cursor.seek_to_first();
        assert!(!cursor.is_valid(), "ModelHarness needs an empty store");
        Self {
            db,
            model: BTreeMap::new(),
        }
    }

    /// Applies `op` directly to the store and to the model.
    pub fn apply(&mut self, op: &StoreOp) {
        match op {
            StoreOp::Put(key, value) => {
                let written = self
                    .db
                    .put(key.as_slice(), value.as_slice())
                    .expect("Failed to put");
                assert_eq!(written, value.len());
                self.model.insert(key.clone(), value.clone());
            }
            StoreOp::Remove(key) => {
                self.db.remove(key.as_slice()).expect("Failed to remove");
                self.model.remove(key);
            }
        }
    }

    /// Applies `ops` through a [`Batch`] flushing every `threshold` bytes.
    pub fn apply_batched(&mut self, lock: &ReadWriteLock, ops: &[StoreOp], threshold: usize) {
        let scope = ScopedDb::write(self.db, lock);
        let mut batch = Batch::with_threshold(&scope, threshold);
        for op in ops {
            match op {
                StoreOp::Put(key, value) => {
                    batch
                        .put(key.as_slice(), value.as_slice())
                        .expect("Failed to put");
                    self.model.insert(key.clone(), value.clone());
                }
                StoreOp::Remove(key) => {
                    batch.remove(key.as_slice());
                    self.model.remove(key);
                }
            }
        }
        batch.flush().expect("Failed to flush batch");
    }

    /// Model entries sorted the way the store sorts them.
    pub fn expected(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let ordering = self.db.ordering();
        let mut entries: Vec<_> = self
            .model
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| ordering.compare(&a.0, &b.0));
        entries
    }

    /// Checks every model key reads back its value.
    pub fn verify_point_reads(&self) {
        for (key, expected) in &self.model {
            let actual = self.db.get(key.as_slice()).expect("Failed to get");
            assert_eq!(actual.as_ref(), Some(expected), "mismatch for key {key:?}");
        }
    }

    /// Checks forward and backward cursor scans match the sorted model.
    pub fn verify_scans(&self) {
        let expected = self.expected();

        let mut cursor = self.db.create_cursor().expect("Failed to create cursor");
        let mut forward = Vec::new();
        cursor.seek_to_first();
        while cursor.is_valid() {
            forward.push((cursor.key().to_vec(), cursor.value().to_vec()));
            cursor.next();
        }
        assert_eq!(forward, expected, "forward scan differs from model");

        let mut backward = Vec::new();
        cursor.seek_to_last();
        while cursor.is_valid() {
            backward.push((cursor.key().to_vec(), cursor.value().to_vec()));
            cursor.previous();
        }
        backward.reverse();
        assert_eq!(backward, expected, "backward scan differs from model");
    }

    /// Checks `seek(target)` lands on the first model key at or after it.
    pub fn verify_seek(&self, target: &[u8]) {
        let ordering = self.db.ordering();
        let want = self
            .expected()
            .into_iter()
            .find(|(k, _)| ordering.compare(k, target) != std::cmp::Ordering::Less)
            .map(|(k, _)| k);

        let mut cursor = self.db.create_cursor().expect("Failed to create cursor");
        cursor.seek(target);
        let got = cursor.is_valid().then(|| cursor.key().to_vec());
        assert_eq!(got, want, "seek({target:?}) landed wrong");
    }

    /// Runs every check.
    pub fn verify_all(&self) {
        self.verify_point_reads();
        self.verify_scans();
    }

    /// Number of live keys in the model.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }

    /// Ordering of the underlying store.
    pub fn ordering(&self) -> KeyOrdering {
        self.db.ordering()
    }
}
