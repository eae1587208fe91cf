//! Byte-bounded LRU cache of values read from the log.

use lru::LruCache;
use std::sync::Arc;

/// Caches values by their log offset.
///
/// Offsets are never reused while the log is only appended to, so an entry
/// can't go stale until compaction rewrites the log and calls [`Self::clear`].
pub struct ValueCache {
    entries: LruCache<u64, Arc<[u8]>>,
    capacity: usize,
    used: usize,
}

impl ValueCache {
    /// Creates a cache holding at most `capacity` value bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            capacity,
            used: 0,
        }
    }

    /// Returns the cached value at `offset`, marking it recently used.
    pub fn get(&mut self, offset: u64) -> Option<Arc<[u8]>> {
        self.entries.get(&offset).cloned()
    }

    /// Caches `value`, evicting least recently used entries to make room.
    ///
    /// Values larger than the whole cache are not kept.
    pub fn insert(&mut self, offset: u64, value: Arc<[u8]>) {
        if value.len() > self.capacity {
            return;
        }

        self.used += value.len();
        if let Some(old) = self.entries.put(offset, value) {
            self.used -= old.len();
        }

        while self.used > self.capacity {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.used -= evicted.len(),
                None => break,
            }
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl ValueCache {
        fn used(&self) -> usize {
            self.used
        }

        fn len(&self) -> usize {
            self.entries.len()
        }
    }

    fn value(len: usize) -> Arc<[u8]> {
        Arc::from(vec![7u8; len])
    }

    #[test]
    fn hit_after_insert() {
        let mut cache = ValueCache::new(100);
        cache.insert(10, value(5));
        assert_eq!(cache.get(10).unwrap().len(), 5);
        assert!(cache.get(11).is_none());
        assert_eq!(cache.used(), 5);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = ValueCache::new(10);
        cache.insert(1, value(4));
        cache.insert(2, value(4));
        // Touch 1 so 2 becomes the eviction candidate.
        cache.get(1);
        cache.insert(3, value(4));

        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());
        assert_eq!(cache.used(), 8);
    }

    #[test]
    fn oversized_values_are_skipped() {
        let mut cache = ValueCache::new(8);
        cache.insert(1, value(9));
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used(), 0);
    }

    #[test]
    fn reinsert_replaces_accounting() {
        let mut cache = ValueCache::new(100);
        cache.insert(1, value(30));
        cache.insert(1, value(10));
        assert_eq!(cache.used(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_resets() {
        let mut cache = ValueCache::new(100);
        cache.insert(1, value(30));
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.used(), 0);
    }
}
