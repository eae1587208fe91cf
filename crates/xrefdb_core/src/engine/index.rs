//! In-memory ordered key index.

use crate::ordering::KeyOrdering;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Location of a live value in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValuePointer {
    /// Absolute offset of the value bytes.
    pub offset: u64,
    /// Value length.
    pub len: u32,
}

/// A key that sorts under its store's ordering.
#[derive(Debug, Clone)]
pub struct IndexKey {
    bytes: Arc<[u8]>,
    ordering: KeyOrdering,
}

impl IndexKey {
    /// Copies `bytes` into a key sorted by `ordering`.
    pub fn new(ordering: KeyOrdering, bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
            ordering,
        }
    }

    /// Returns the key bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ordering.compare(&self.bytes, &other.bytes)
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

/// Live keys and where their values are.
///
/// Cloned on write while a cursor still holds the previous version, so
/// cursors always traverse the snapshot they were created with.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    ordering: KeyOrdering,
    entries: BTreeMap<IndexKey, ValuePointer>,
}

impl KeyIndex {
    /// Creates an empty index.
    pub fn new(ordering: KeyOrdering) -> Self {
        Self {
            ordering,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the ordering keys are sorted by.
    pub fn ordering(&self) -> KeyOrdering {
        self.ordering
    }

    fn probe(&self, key: &[u8]) -> IndexKey {
        self.ordering.check_key(key);
        IndexKey::new(self.ordering, key)
    }

    /// Points `key` at a new value.
    pub fn insert(&mut self, key: &[u8], pointer: ValuePointer) {
        self.entries.insert(self.probe(key), pointer);
    }

    /// Forgets `key`, returning its old pointer.
    pub fn remove(&mut self, key: &[u8]) -> Option<ValuePointer> {
        self.entries.remove(&self.probe(key))
    }

    /// Looks up `key`.
    pub fn get(&self, key: &[u8]) -> Option<ValuePointer> {
        self.entries.get(&self.probe(key)).copied()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Smallest entry.
    pub fn first(&self) -> Option<(&IndexKey, &ValuePointer)> {
        self.entries.iter().next()
    }

    /// Largest entry.
    pub fn last(&self) -> Option<(&IndexKey, &ValuePointer)> {
        self.entries.iter().next_back()
    }

    /// First entry at or after `key`.
    pub fn seek(&self, key: &[u8]) -> Option<(&IndexKey, &ValuePointer)> {
        let probe = self.probe(key);
        self.entries.range(probe..).next()
    }

    /// Entry immediately after `key`.
    pub fn after(&self, key: &IndexKey) -> Option<(&IndexKey, &ValuePointer)> {
        self.entries
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
    }

    /// Entry immediately before `key`.
    pub fn before(&self, key: &IndexKey) -> Option<(&IndexKey, &ValuePointer)> {
        self.entries.range(..key).next_back()
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&IndexKey, &ValuePointer)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationKey;

    fn ptr(offset: u64) -> ValuePointer {
        ValuePointer { offset, len: 1 }
    }

    fn keys(index: &KeyIndex) -> Vec<Vec<u8>> {
        index.iter().map(|(k, _)| k.bytes().to_vec()).collect()
    }

    #[test]
    fn insert_get_remove() {
        let mut index = KeyIndex::new(KeyOrdering::Bytewise);
        index.insert(b"a", ptr(1));
        index.insert(b"a", ptr(2));
        assert_eq!(index.get(b"a"), Some(ptr(2)));
        assert_eq!(index.len(), 1);

        assert_eq!(index.remove(b"a"), Some(ptr(2)));
        assert_eq!(index.remove(b"a"), None);
        assert_eq!(index.len(), 0);
    }

    #[test]
    #[should_panic(expected = "exactly 8 bytes")]
    fn empty_location_index_rejects_short_key() {
        KeyIndex::new(KeyOrdering::Location).get(b"short");
    }

    #[test]
    fn iterates_in_location_order() {
        let mut index = KeyIndex::new(KeyOrdering::Location);
        for (f, o) in [(3, 100), (1, 256), (3, 50), (1, 1)] {
            index.insert(&LocationKey::new(f, o).encode(), ptr(0));
        }

        let order: Vec<LocationKey> = keys(&index)
            .iter()
            .map(|k| LocationKey::decode(k).unwrap())
            .collect();
        assert_eq!(
            order,
            vec![
                LocationKey::new(1, 1),
                LocationKey::new(1, 256),
                LocationKey::new(3, 50),
                LocationKey::new(3, 100),
            ]
        );
    }

    #[test]
    fn seek_after_before() {
        let mut index = KeyIndex::new(KeyOrdering::Bytewise);
        for key in [&b"b"[..], b"d", b"f"] {
            index.insert(key, ptr(0));
        }

        assert_eq!(index.seek(b"c").unwrap().0.bytes(), b"d");
        assert_eq!(index.seek(b"d").unwrap().0.bytes(), b"d");
        assert!(index.seek(b"g").is_none());

        let (d, _) = index.seek(b"d").unwrap();
        assert_eq!(index.after(d).unwrap().0.bytes(), b"f");
        assert_eq!(index.before(d).unwrap().0.bytes(), b"b");

        let (first, _) = index.first().unwrap();
        assert!(index.before(first).is_none());
        let (last, _) = index.last().unwrap();
        assert!(index.after(last).is_none());
    }

    #[test]
    fn clones_are_independent() {
        let mut index = KeyIndex::new(KeyOrdering::Bytewise);
        index.insert(b"k", ptr(0));
        let snapshot = Arc::new(index.clone());
        index.remove(b"k");

        assert_eq!(snapshot.get(b"k"), Some(ptr(0)));
        assert_eq!(index.get(b"k"), None);
    }
}
