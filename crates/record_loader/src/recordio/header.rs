//! Record header codec.
//!
//! Every record payload starts with a fixed 24-byte header:
//!
//! ```text
//! ┌──────────┬───────────┬──────────┬──────────┐
//! │ flag u32 │ label f32 │  id u64  │ id2 u64  │   (little-endian)
//! └──────────┴───────────┴──────────┴──────────┘
//! ```
//!
//! When `flag > 0` the header is followed by `flag` little-endian `f32`
//! values which replace the inline scalar label. Whatever follows is the
//! record body (usually an encoded image).

use anyhow::{ensure, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size in bytes of the fixed part of a record header.
pub const HEADER_SIZE: usize = 24;

/// Label stored in a record header.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Scalar(f32),
    Vector(Vec<f32>),
}

impl Label {
    /// Returns the scalar, or the first element of a vector label.
    /// An empty vector has no first element.
    pub fn first(&self) -> Option<f32> {
        match self {
            Label::Scalar(value) => Some(*value),
            Label::Vector(values) => values.first().copied(),
        }
    }

    /// Returns the label as a slice, treating a scalar as a one-element vector.
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Label::Scalar(value) => std::slice::from_ref(value),
            Label::Vector(values) => values,
        }
    }
}

impl From<f32> for Label {
    fn from(value: f32) -> Self {
        Label::Scalar(value)
    }
}

impl From<Vec<f32>> for Label {
    fn from(values: Vec<f32>) -> Self {
        Label::Vector(values)
    }
}

/// Decoded record header.
///
/// `flag` mirrors what is on disk: zero for scalar labels, otherwise the
/// number of label values that follow the fixed header.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub flag: u32,
    pub label: Label,
    pub id: u64,
    pub id2: u64,
}

impl RecordHeader {
    pub fn new(label: impl Into<Label>, id: u64, id2: u64) -> Self {
        let label = label.into();
        let flag = match &label {
            Label::Scalar(_) => 0,
            Label::Vector(values) => values.len() as u32,
        };
        Self {
            flag,
            label,
            id,
            id2,
        }
    }
}

/// Serializes a header and body into a single record payload.
///
/// A vector label sets `flag` to its length and zeroes the inline scalar,
/// regardless of the `flag` value carried by `header`.
pub fn pack_record(header: &RecordHeader, body: &[u8]) -> Bytes {
    let extra = match &header.label {
        Label::Scalar(_) => 0,
        Label::Vector(values) => values.len() * 4,
    };
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + extra + body.len());

    match &header.label {
        Label::Scalar(value) => {
            buf.put_u32_le(0);
            buf.put_f32_le(*value);
        }
        Label::Vector(values) => {
            buf.put_u32_le(values.len() as u32);
            buf.put_f32_le(0.0);
        }
    }
    buf.put_u64_le(header.id);
    buf.put_u64_le(header.id2);

    if let Label::Vector(values) = &header.label {
        for value in values {
            buf.put_f32_le(*value);
        }
    }
    buf.put_slice(body);
    buf.freeze()
}

/// Splits a record payload into its header and body.
///
/// The returned body is a zero-copy slice of `payload`.
pub fn unpack_record(mut payload: Bytes) -> Result<(RecordHeader, Bytes)> {
    ensure!(
        payload.len() >= HEADER_SIZE,
        "Record too short for header: {} bytes (need at least {})",
        payload.len(),
        HEADER_SIZE
    );

    let flag = payload.get_u32_le();
    let scalar = payload.get_f32_le();
    let id = payload.get_u64_le();
    let id2 = payload.get_u64_le();

    let label = if flag > 0 {
        let label_bytes = flag as usize * 4;
        ensure!(
            payload.remaining() >= label_bytes,
            "Record header declares {} label values but only {} bytes remain",
            flag,
            payload.remaining()
        );
        Label::Vector((0..flag).map(|_| payload.get_f32_le()).collect())
    } else {
        Label::Scalar(scalar)
    };

    Ok((
        RecordHeader {
            flag,
            label,
            id,
            id2,
        },
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_header_layout() -> Result<()> {
        let packed = pack_record(&RecordHeader::new(7.0, 3, 0), b"img");
        assert_eq!(packed.len(), HEADER_SIZE + 3);
        assert_eq!(&packed[0..4], &0u32.to_le_bytes());
        assert_eq!(&packed[4..8], &7.0f32.to_le_bytes());

        let (header, body) = unpack_record(packed)?;
        assert_eq!(header.flag, 0);
        assert_eq!(header.label, Label::Scalar(7.0));
        assert_eq!(header.id, 3);
        assert_eq!(&body[..], b"img");
        Ok(())
    }

    #[test]
    fn test_vector_label_sets_flag() -> Result<()> {
        let packed = pack_record(&RecordHeader::new(vec![11.0, 42.0], 0, 0), &[]);
        assert_eq!(packed.len(), HEADER_SIZE + 8);

        let (header, body) = unpack_record(packed)?;
        assert_eq!(header.flag, 2);
        assert_eq!(header.label.as_slice(), &[11.0, 42.0]);
        assert_eq!(header.label.first(), Some(11.0));
        assert!(body.is_empty());
        Ok(())
    }

    #[test]
    fn test_truncated_records_are_rejected() {
        assert!(unpack_record(Bytes::from_static(&[0u8; 10])).is_err());

        // flag = 4 but no label values follow
        let mut raw = BytesMut::new();
        raw.put_u32_le(4);
        raw.put_f32_le(0.0);
        raw.put_u64_le(0);
        raw.put_u64_le(0);
        assert!(unpack_record(raw.freeze()).is_err());
    }
}
