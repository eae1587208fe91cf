//! Atomic groups of writes.

/// One buffered operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or overwrite `key`.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove `key` if present.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl WriteOp {
    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered list of puts and deletes applied as one log record.
///
/// Later operations on the same key win, so `put(k, a); delete(k)` leaves
/// `k` absent. A reader never observes part of a set.
///
/// ```rust
/// use xrefdb_core::{Database, Flags, WriteSet};
///
/// let db = Database::open_in_memory(Flags::NONE);
/// let mut set = WriteSet::new();
/// set.put(b"a", b"1");
/// set.put(b"b", b"2");
/// set.delete(b"a");
/// db.write(&set).unwrap();
///
/// assert!(!db.contains(b"a").unwrap());
/// assert_eq!(db.get(b"b").unwrap().as_deref(), Some(&b"2"[..]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    ops: Vec<WriteOp>,
}

impl WriteSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a put.
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.ops.push(WriteOp::Put {
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        });
    }

    /// Appends a delete.
    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        self.ops.push(WriteOp::Delete {
            key: key.as_ref().to_vec(),
        });
    }

    /// Returns the buffered operations in order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of buffered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops every buffered operation.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Total value bytes carried by the puts.
    #[must_use]
    pub fn value_bytes(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                WriteOp::Put { value, .. } => value.len(),
                WriteOp::Delete { .. } => 0,
            })
            .sum()
    }

    pub(crate) fn counts(&self) -> (u64, u64) {
        let puts = self
            .ops
            .iter()
            .filter(|op| matches!(op, WriteOp::Put { .. }))
            .count() as u64;
        (puts, self.ops.len() as u64 - puts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut set = WriteSet::new();
        set.put(b"b", b"2");
        set.delete(b"a");
        set.put(b"a", b"1");

        let keys: Vec<&[u8]> = set.ops().iter().map(WriteOp::key).collect();
        assert_eq!(keys, vec![&b"b"[..], b"a", b"a"]);
    }

    #[test]
    fn value_bytes_ignores_deletes() {
        let mut set = WriteSet::new();
        set.put(b"k1", [0u8; 10]);
        set.delete(b"some-long-key-that-is-not-counted");
        set.put(b"k2", [0u8; 5]);

        assert_eq!(set.value_bytes(), 15);
        assert_eq!(set.counts(), (2, 1));
    }

    #[test]
    fn clear_empties() {
        let mut set = WriteSet::new();
        set.put(b"k", b"v");
        assert_eq!(set.len(), 1);
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.value_bytes(), 0);
    }
}
