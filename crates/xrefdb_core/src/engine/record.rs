//! Log record format.
//!
//! Every record is framed as:
//!
//! ```text
//! | magic "XLOG" (4) | version u16 (2) | type u8 (1) | len u32 (4) | payload | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers header and payload.
//! Payloads by type:
//!
//! - `Put`: `key_len u32 | key | value_len u32 | value`
//! - `Delete`: `key_len u32 | key`
//! - `Batch`: `count u32`, then per op a tag byte (1 put, 2 delete) and the
//!   matching body

use crate::engine::write_set::{WriteOp, WriteSet};
use crate::error::{CoreError, CoreResult};

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"XLOG";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing CRC size.
pub const CRC_SIZE: usize = 4;

const TAG_PUT: u8 = 1;
const TAG_DELETE: u8 = 2;

/// Type of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// A single put.
    Put = 1,
    /// A single delete.
    Delete = 2,
    /// Several operations applied together.
    Batch = 3,
}

impl RecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Delete),
            3 => Some(Self::Batch),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Where a value sits, relative to the start of its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueSpan {
    /// Offset from the first byte of the record.
    pub start: u64,
    /// Value length.
    pub len: u32,
}

/// A framed record ready to append.
#[derive(Debug)]
pub struct EncodedRecord {
    /// Full record bytes, envelope included.
    pub data: Vec<u8>,
    /// Value position of each op, `None` for deletes.
    pub spans: Vec<Option<ValueSpan>>,
}

/// One operation read back from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedOp<'a> {
    /// A put, with its value located inside the record.
    Put {
        /// Key bytes.
        key: &'a [u8],
        /// Value location.
        span: ValueSpan,
    },
    /// A delete.
    Delete {
        /// Key bytes.
        key: &'a [u8],
    },
}

/// Computes CRC32 (IEEE) of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Frames a write set as a single record.
///
/// A lone put or delete gets its own record type; anything else is a batch.
///
/// # Errors
///
/// Returns an error if a key, value or the payload exceeds the 4 GiB length
/// fields.
pub fn encode(set: &WriteSet) -> CoreResult<EncodedRecord> {
    let (record_type, tagged) = match set.ops() {
        [WriteOp::Put { .. }] => (RecordType::Put, false),
        [WriteOp::Delete { .. }] => (RecordType::Delete, false),
        _ => (RecordType::Batch, true),
    };

    let mut data = Vec::with_capacity(HEADER_SIZE + estimate_payload(set) + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.push(record_type.as_byte());
    // Length is patched once the payload is known.
    data.extend_from_slice(&[0u8; 4]);

    if tagged {
        data.extend_from_slice(&len_u32(set.len(), "batch count")?.to_le_bytes());
    }

    let mut spans = Vec::with_capacity(set.len());
    for op in set.ops() {
        match op {
            WriteOp::Put { key, value } => {
                if tagged {
                    data.push(TAG_PUT);
                }
                put_bytes(&mut data, key, "key")?;
                let len = len_u32(value.len(), "value")?;
                data.extend_from_slice(&len.to_le_bytes());
                spans.push(Some(ValueSpan {
                    start: data.len() as u64,
                    len,
                }));
                data.extend_from_slice(value);
            }
            WriteOp::Delete { key } => {
                if tagged {
                    data.push(TAG_DELETE);
                }
                put_bytes(&mut data, key, "key")?;
                spans.push(None);
            }
        }
    }

    let payload_len = len_u32(data.len() - HEADER_SIZE, "record payload")?;
    data[7..HEADER_SIZE].copy_from_slice(&payload_len.to_le_bytes());

    let crc = compute_crc32(&data);
    data.extend_from_slice(&crc.to_le_bytes());

    Ok(EncodedRecord { data, spans })
}

/// Decodes a record payload into its operations.
///
/// Value spans are made relative to the record start, matching
/// [`EncodedRecord::spans`].
pub fn decode_payload(record_type: RecordType, payload: &[u8]) -> CoreResult<Vec<DecodedOp<'_>>> {
    let mut reader = PayloadReader {
        payload,
        cursor: 0,
    };

    let ops = match record_type {
        RecordType::Put => vec![reader.put()?],
        RecordType::Delete => vec![reader.delete()?],
        RecordType::Batch => {
            let count = reader.u32()? as usize;
            // Each op needs at least a tag and a key length.
            if count > payload.len() / 5 {
                return Err(CoreError::log_corruption(format!(
                    "batch count {count} does not fit a {} byte payload",
                    payload.len()
                )));
            }
            let mut ops = Vec::with_capacity(count);
            for _ in 0..count {
                let op = match reader.take(1)?[0] {
                    TAG_PUT => reader.put()?,
                    TAG_DELETE => reader.delete()?,
                    tag => {
                        return Err(CoreError::log_corruption(format!(
                            "unknown batch op tag {tag}"
                        )))
                    }
                };
                ops.push(op);
            }
            ops
        }
    };

    if reader.cursor != payload.len() {
        return Err(CoreError::log_corruption(format!(
            "trailing bytes in {record_type:?} record: expected {} bytes, got {}",
            reader.cursor,
            payload.len()
        )));
    }

    Ok(ops)
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
}

impl<'a> PayloadReader<'a> {
    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        if self.payload.len() - self.cursor < n {
            return Err(CoreError::log_corruption("unexpected end of payload"));
        }
        let bytes = &self.payload[self.cursor..self.cursor + n];
        self.cursor += n;
        Ok(bytes)
    }

    fn u32(&mut self) -> CoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn bytes(&mut self) -> CoreResult<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn put(&mut self) -> CoreResult<DecodedOp<'a>> {
        let key = self.bytes()?;
        let len = self.u32()?;
        let start = (HEADER_SIZE + self.cursor) as u64;
        self.take(len as usize)?;
        Ok(DecodedOp::Put {
            key,
            span: ValueSpan { start, len },
        })
    }

    fn delete(&mut self) -> CoreResult<DecodedOp<'a>> {
        Ok(DecodedOp::Delete { key: self.bytes()? })
    }
}

fn len_u32(len: usize, what: &str) -> CoreResult<u32> {
    u32::try_from(len).map_err(|_| {
        CoreError::invalid_operation(format!("{what} too large: {len} bytes exceeds 4 GiB"))
    })
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8], what: &str) -> CoreResult<()> {
    buf.extend_from_slice(&len_u32(bytes.len(), what)?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn estimate_payload(set: &WriteSet) -> usize {
    set.ops()
        .iter()
        .map(|op| match op {
            WriteOp::Put { key, value } => 9 + key.len() + value.len(),
            WriteOp::Delete { key } => 5 + key.len(),
        })
        .sum::<usize>()
        + 4
}
