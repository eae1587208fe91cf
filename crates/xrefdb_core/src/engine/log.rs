//! The append-only record log.

use crate::engine::record::{
    self, compute_crc32, DecodedOp, EncodedRecord, RecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC,
    LOG_VERSION,
};
use crate::error::{CoreError, CoreResult};
use xrefdb_storage::StorageBackend;

/// Read buffer size for replay.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Appends framed records to a log device and reads values back.
pub struct RecordLog {
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
}

impl RecordLog {
    /// Wraps a log device.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
        }
    }

    /// Appends a record and returns the offset it starts at.
    ///
    /// The record is flushed before returning, and fsynced when the log was
    /// opened with `sync_on_write`. If that fails the record is cut off
    /// again, so a failed append never reappears on replay.
    pub fn append(&mut self, record: &EncodedRecord) -> CoreResult<u64> {
        let offset = self.backend.append(&record.data)?;
        let persisted = if self.sync_on_write {
            self.backend.sync()
        } else {
            self.backend.flush()
        };
        if let Err(err) = persisted {
            if let Err(rollback) = self.backend.truncate(offset) {
                tracing::warn!(offset, error = %rollback, "failed to roll back unpersisted record");
            }
            return Err(err.into());
        }
        Ok(offset)
    }

    /// Reads `len` bytes at absolute `offset`.
    pub fn read(&self, offset: u64, len: usize) -> CoreResult<Vec<u8>> {
        Ok(self.backend.read_at(offset, len)?)
    }

    /// Forces everything appended so far to durable storage.
    pub fn sync(&mut self) -> CoreResult<()> {
        Ok(self.backend.sync()?)
    }

    /// Returns the log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Cuts the log back to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> CoreResult<()> {
        Ok(self.backend.truncate(len)?)
    }

    /// Swaps in a different log device, returning the old one.
    pub fn replace_backend(&mut self, backend: Box<dyn StorageBackend>) -> Box<dyn StorageBackend> {
        std::mem::replace(&mut self.backend, backend)
    }

    /// Returns a streaming iterator over the records in the log.
    pub fn iter(&self) -> CoreResult<RecordIterator<'_>> {
        RecordIterator::new(self.backend.as_ref())
    }
}

/// A replayed operation with its value located in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOp {
    /// Insert or overwrite.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Absolute value offset.
        offset: u64,
        /// Value length.
        len: u32,
    },
    /// Remove.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

/// Streams records from a log device with bounded memory.
///
/// - CRC mismatches, bad magic, unknown types and newer versions are errors
/// - A truncated final record ends iteration; [`Self::valid_len`] then tells
///   where the last complete record ended
pub struct RecordIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    current_offset: u64,
    buffer: Vec<u8>,
    buffer_start: u64,
    finished: bool,
}

impl<'a> RecordIterator<'a> {
    fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            total_size: backend.size()?,
            backend,
            current_offset: 0,
            buffer: Vec::new(),
            buffer_start: 0,
            finished: false,
        })
    }

    /// Size of the log as seen when iteration started.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// End of the last complete record read so far.
    pub fn valid_len(&self) -> u64 {
        self.current_offset
    }

    /// Makes `[current_offset, current_offset + len)` available in the buffer.
    ///
    /// Returns `false` if the log ends first.
    fn ensure_buffered(&mut self, len: usize) -> CoreResult<bool> {
        let end = self.current_offset + len as u64;
        if end > self.total_size {
            return Ok(false);
        }
        if self.current_offset >= self.buffer_start
            && end <= self.buffer_start + self.buffer.len() as u64
        {
            return Ok(true);
        }

        let remaining = (self.total_size - self.current_offset) as usize;
        let read_len = len.max(READ_BUFFER_SIZE).min(remaining);
        self.buffer = self.backend.read_at(self.current_offset, read_len)?;
        self.buffer_start = self.current_offset;
        Ok(true)
    }

    fn buffered(&self, len: usize) -> &[u8] {
        let start = (self.current_offset - self.buffer_start) as usize;
        &self.buffer[start..start + len]
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, Vec<ReplayOp>)>> {
        let record_offset = self.current_offset;

        if !self.ensure_buffered(HEADER_SIZE)? {
            return Ok(None);
        }

        let header = self.buffered(HEADER_SIZE);
        if header[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(format!(
                "invalid magic at offset {record_offset}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(CoreError::log_corruption(format!(
                "unsupported version {version} at offset {record_offset}"
            )));
        }

        let type_byte = header[6];
        let record_type = RecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::log_corruption(format!(
                "unknown record type {type_byte} at offset {record_offset}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;

        if !self.ensure_buffered(total_len)? {
            // A torn append is always the last thing in the log. An intact
            // record further on means this length field is damaged.
            if let Some(next) = self.find_intact_record(record_offset + HEADER_SIZE as u64)? {
                return Err(CoreError::log_corruption(format!(
                    "record at offset {record_offset} claims {payload_len} payload bytes \
                     past the end of the log, but a complete record starts at offset {next}"
                )));
            }
            return Ok(None);
        }

        let frame = self.buffered(total_len);
        let body = &frame[..HEADER_SIZE + payload_len];
        let stored_crc = u32::from_le_bytes([
            frame[total_len - 4],
            frame[total_len - 3],
            frame[total_len - 2],
            frame[total_len - 1],
        ]);
        let computed_crc = compute_crc32(body);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                offset: record_offset,
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let ops = record::decode_payload(record_type, &body[HEADER_SIZE..])?
            .into_iter()
            .map(|op| match op {
                DecodedOp::Put { key, span } => ReplayOp::Put {
                    key: key.to_vec(),
                    offset: record_offset + span.start,
                    len: span.len,
                },
                DecodedOp::Delete { key } => ReplayOp::Delete { key: key.to_vec() },
            })
            .collect();

        self.current_offset += total_len as u64;
        Ok(Some((record_offset, ops)))
    }

    /// Returns the offset of the first complete, checksum-valid record at or
    /// after `from`.
    fn find_intact_record(&self, from: u64) -> CoreResult<Option<u64>> {
        let mut chunk_start = from;
        while chunk_start + HEADER_SIZE as u64 <= self.total_size {
            let len = (self.total_size - chunk_start).min(READ_BUFFER_SIZE as u64) as usize;
            let chunk = self.backend.read_at(chunk_start, len)?;
            for (pos, window) in chunk.windows(LOG_MAGIC.len()).enumerate() {
                if window == LOG_MAGIC && self.is_intact_record(chunk_start + pos as u64)? {
                    return Ok(Some(chunk_start + pos as u64));
                }
            }
            if chunk_start + len as u64 >= self.total_size {
                break;
            }
            // Overlap so a magic split across chunks is still seen.
            chunk_start += (len - (LOG_MAGIC.len() - 1)) as u64;
        }
        Ok(None)
    }

    fn is_intact_record(&self, offset: u64) -> CoreResult<bool> {
        if offset + HEADER_SIZE as u64 > self.total_size {
            return Ok(false);
        }
        let header = self.backend.read_at(offset, HEADER_SIZE)?;
        let version = u16::from_le_bytes([header[4], header[5]]);
        if header[0..4] != LOG_MAGIC
            || version > LOG_VERSION
            || RecordType::from_byte(header[6]).is_none()
        {
            return Ok(false);
        }

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;
        if offset + total_len as u64 > self.total_size {
            return Ok(false);
        }
        let frame = self.backend.read_at(offset, total_len)?;
        let (body, crc) = frame.split_at(total_len - CRC_SIZE);
        Ok(u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]) == compute_crc32(body))
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = CoreResult<(u64, Vec<ReplayOp>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
