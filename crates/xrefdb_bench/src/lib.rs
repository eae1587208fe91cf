//! Benchmark utilities.

use rand::Rng;
use xrefdb_core::{Database, LocationKey};

/// Generate random value bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` random symbol locations spread over `files` files.
pub fn random_locations(count: usize, files: u32) -> Vec<LocationKey> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| LocationKey::new(rng.gen_range(0..files), rng.gen()))
        .collect()
}

/// Fill `db` with `count` symbols of `value_size` bytes at random locations.
pub fn populate(db: &Database, count: usize, value_size: usize) -> Vec<LocationKey> {
    let keys = random_locations(count, 64);
    let value = random_data(value_size);
    for key in &keys {
        db.put(&key.encode(), value.as_slice()).unwrap();
    }
    keys
}
