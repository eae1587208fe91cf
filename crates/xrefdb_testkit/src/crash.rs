//! Crash simulation on the record log.
//!
//! A crash in the middle of an append leaves a partial record at the end of
//! `data.log`; a bad disk flips bytes anywhere. These helpers produce both
//! states on a closed store so tests can reopen it and check recovery.
//!
//! ## Test Strategy
//!
//! 1. **Torn tail** - the last record is cut short; reopening drops it and
//!    keeps everything before it
//! 2. **Corruption** - a byte inside a complete record changes, or a length
//!    field points past records that follow; reopening fails rather than
//!    serving damaged data or cutting the log
//! 3. **Stale compaction** - a half-written `data.log.compact` is left
//!    behind; reopening removes it

use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Name of the record log inside a store directory.
pub const LOG_FILE: &str = "data.log";

/// Name of the in-progress compaction target inside a store directory.
pub const COMPACT_FILE: &str = "data.log.compact";

/// Size of the record log of the store at `dir`.
pub fn log_len(dir: &Path) -> u64 {
    fs::metadata(dir.join(LOG_FILE))
        .expect("Failed to stat log")
        .len()
}

/// Cuts `bytes` off the end of the record log, as a crash mid-append would.
pub fn tear_log_tail(dir: &Path, bytes: u64) {
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .write(true)
        .open(&path)
        .expect("Failed to open log");
    let len = file.metadata().expect("Failed to stat log").len();
    file.set_len(len.saturating_sub(bytes))
        .expect("Failed to truncate log");
}

/// Appends `garbage` to the record log, as an interrupted write of a record
/// header would.
pub fn append_garbage(dir: &Path, garbage: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(dir.join(LOG_FILE))
        .expect("Failed to open log");
    file.write_all(garbage).expect("Failed to append garbage");
}

/// Inverts the byte at `offset` in the record log.
pub fn flip_log_byte(dir: &Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(dir.join(LOG_FILE))
        .expect("Failed to open log");
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.read_exact(&mut byte).expect("Failed to read byte");
    byte[0] ^= 0xFF;
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(&byte).expect("Failed to write byte");
}

/// Writes `bytes` over the record log starting at `offset`.
pub fn overwrite_log_bytes(dir: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .write(true)
        .open(dir.join(LOG_FILE))
        .expect("Failed to open log");
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(bytes).expect("Failed to write bytes");
}

/// Leaves a partial compaction target in the store directory.
pub fn leave_stale_compaction(dir: &Path) {
    fs::write(dir.join(COMPACT_FILE), b"interrupted compaction").expect("Failed to write file");
}
