//! # xrefdb Storage
//!
//! Byte-level log devices for the xrefdb engine.
//!
//! A log device is an **append-only byte store** addressed by offset. The
//! engine in `xrefdb_core` frames its records on top of it and keeps its own
//! index of where each value lives; devices never interpret the bytes.
//!
//! ## Design Principles
//!
//! - Writes only ever append; `truncate` exists for torn-tail repair
//! - Reads are positional and take `&self`, so many readers can share a device
//! - Must be `Send + Sync`
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral stores
//! - [`FileBackend`] - For persistent stores using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use xrefdb_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut log = InMemoryBackend::new();
//! let offset = log.append(b"symbol record").unwrap();
//! let mut buf = [0u8; 6];
//! log.read_into(offset, &mut buf).unwrap();
//! assert_eq!(&buf, b"symbol");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
