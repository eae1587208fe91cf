//! # xrefdb Testkit
//!
//! Test utilities for xrefdb.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - Property-based test generators using proptest
//! - A model-checking harness that mirrors a store in a `BTreeMap`
//! - Crash simulation on the record log
//! - Concurrent stress runs over a [`xrefdb_core::SharedDatabase`]
//!
//! ## Usage
//!
//! ```rust
//! use xrefdb_core::Flags;
//! use xrefdb_testkit::prelude::*;
//!
//! let mut store = TestStore::new(Flags::LOCATION_KEYS);
//! store.put(&loc(3, 100), b"sym1").unwrap();
//! store.reopen();
//! assert_eq!(store.get(&loc(3, 100)).unwrap(), Some(b"sym1".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
