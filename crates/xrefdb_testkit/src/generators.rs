//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random keys, values and operation
//! sequences that respect each ordering's key schema.

use proptest::prelude::*;
use xrefdb_core::{KeyOrdering, LocationKey};

/// Strategy for arbitrary location keys.
pub fn location_key_strategy() -> impl Strategy<Value = LocationKey> {
    (any::<u32>(), any::<u32>()).prop_map(|(file_id, offset)| LocationKey::new(file_id, offset))
}

/// Strategy for location keys drawn from a small space, so that files and
/// offsets collide often.
pub fn dense_location_key_strategy() -> impl Strategy<Value = LocationKey> {
    (0u32..4, prop_oneof![0u32..8, Just(255), Just(256), Just(u32::MAX)])
        .prop_map(|(file_id, offset)| LocationKey::new(file_id, offset))
}

/// Strategy for short bytewise keys, including the empty key.
pub fn bytewise_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop_oneof![Just(0u8), Just(b'a'), Just(b'b'), Just(0xFF)], 0..4)
}

/// Strategy for symbol-table values (arbitrary bytes).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for keys valid under `ordering`.
pub fn key_strategy(ordering: KeyOrdering) -> BoxedStrategy<Vec<u8>> {
    match ordering {
        KeyOrdering::Bytewise => bytewise_key_strategy().boxed(),
        KeyOrdering::Location => dense_location_key_strategy()
            .prop_map(|key| key.encode().to_vec())
            .boxed(),
    }
}

/// A single store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Store a value.
    Put(Vec<u8>, Vec<u8>),
    /// Remove a key.
    Remove(Vec<u8>),
}

impl StoreOp {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put(key, _) | Self::Remove(key) => key,
        }
    }
}

/// Strategy for one operation valid under `ordering`; puts outnumber removes.
pub fn store_op_strategy(ordering: KeyOrdering) -> impl Strategy<Value = StoreOp> {
    let key = key_strategy(ordering);
    prop_oneof![
        3 => (key.clone(), value_strategy()).prop_map(|(k, v)| StoreOp::Put(k, v)),
        1 => key.prop_map(StoreOp::Remove),
    ]
}

/// Strategy for an operation sequence of up to `max_len` steps.
pub fn store_ops_strategy(
    ordering: KeyOrdering,
    max_len: usize,
) -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(store_op_strategy(ordering), 0..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn location_keys_are_always_eight_bytes(ops in store_ops_strategy(KeyOrdering::Location, 32)) {
            for op in &ops {
                prop_assert_eq!(op.key().len(), 8);
            }
        }

        #[test]
        fn encoded_order_matches_key_order(a in location_key_strategy(), b in location_key_strategy()) {
            prop_assert_eq!(
                KeyOrdering::Location.compare(&a.encode(), &b.encode()),
                a.cmp(&b)
            );
        }
    }
}
