//! Ordered key-value engine.
//!
//! A store is one append-only record log plus an in-memory index from key to
//! value position:
//!
//! - `record` frames write sets as CRC-checked records
//! - `log` appends records and replays them at open
//! - `index` keeps live keys sorted under the store's [`crate::KeyOrdering`]
//! - `cache` holds recently read values
//! - `store` ties them together as [`Engine`]

mod cache;
mod index;
mod log;
mod record;
mod store;
mod write_set;

pub use index::{IndexKey, KeyIndex, ValuePointer};
pub use store::{CompactionResult, Engine};
pub use write_set::{WriteOp, WriteSet};
