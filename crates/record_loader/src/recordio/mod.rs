//! src/recordio/mod.rs
//!
//! Indexed record files: a `.rec` file of length-prefixed frames plus a
//! `.idx` text file mapping integer keys to byte offsets.
//!
//! ```text
//! .rec frame:
//! ┌───────────┬─────────────┬─────────────────────┬──────────────┐
//! │ magic u32 │ lrecord u32 │ payload (len bytes) │ pad to 4 B   │
//! └───────────┴─────────────┴─────────────────────┴──────────────┘
//!   lrecord = (cflag << 29) | len
//!
//! .idx line:
//!   <key>\t<byte offset>\n
//! ```
//!
//! The payload of a record starts with a [`RecordHeader`] (see `header.rs`).

pub mod header;
pub mod reader;
pub mod writer;

pub use header::{pack_record, unpack_record, Label, RecordHeader, HEADER_SIZE};
pub use reader::{IndexedRecordReader, RecordReader};
pub use writer::IndexedRecordWriter;

use anyhow::{bail, ensure, Result};
use bytes::{Buf, BufMut};

/// Frame marker preceding every record part.
pub const MAGIC: u32 = 0xced7_230a;

const LENGTH_BITS: u32 = 29;
const LENGTH_MASK: u32 = (1 << LENGTH_BITS) - 1;

/// `magic` and `lrecord`, both little-endian u32.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a single frame can carry.
pub const MAX_FRAME_LEN: usize = LENGTH_MASK as usize;

/// Position of a frame within its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Full = 0,
    Start = 1,
    Middle = 2,
    End = 3,
}

pub(crate) fn encode_lrecord(cflag: Continuation, len: usize) -> u32 {
    debug_assert!(len <= MAX_FRAME_LEN);
    ((cflag as u32) << LENGTH_BITS) | (len as u32 & LENGTH_MASK)
}

pub(crate) fn decode_lrecord(lrecord: u32) -> Result<(Continuation, usize)> {
    let cflag = match lrecord >> LENGTH_BITS {
        0 => Continuation::Full,
        1 => Continuation::Start,
        2 => Continuation::Middle,
        3 => Continuation::End,
        other => bail!("Invalid continuation flag {} in record frame", other),
    };
    Ok((cflag, (lrecord & LENGTH_MASK) as usize))
}

/// Writes the 8-byte `magic | lrecord` frame header, little-endian.
pub(crate) fn put_frame_header(buf: &mut impl BufMut, cflag: Continuation, len: usize) {
    buf.put_u32_le(MAGIC);
    buf.put_u32_le(encode_lrecord(cflag, len));
}

/// Reads and validates an 8-byte frame header.
pub(crate) fn get_frame_header(buf: &mut impl Buf) -> Result<(Continuation, usize)> {
    ensure!(
        buf.remaining() >= FRAME_HEADER_SIZE,
        "Record frame header needs {} bytes, got {}",
        FRAME_HEADER_SIZE,
        buf.remaining()
    );
    let magic = buf.get_u32_le();
    ensure!(
        magic == MAGIC,
        "Invalid record magic {:#010x} (expected {:#010x})",
        magic,
        MAGIC
    );
    decode_lrecord(buf.get_u32_le())
}
