use anyhow::{ensure, Context, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{put_frame_header, Continuation, FRAME_HEADER_SIZE, MAGIC, MAX_FRAME_LEN};

/// Writes records together with their `.idx` companion.
///
/// Payloads containing the magic word at a 4-byte-aligned offset are split
/// into several frames so that a reader can always resynchronise on the magic.
///
/// # Example
/// ```ignore
/// let mut writer = IndexedRecordWriter::create("train.idx", "train.rec")?;
/// writer.write_idx(0, &pack_record(&RecordHeader::new(vec![11.0, 11.0], 0, 0), &[]))?;
/// writer.finish()?;
/// ```
pub struct IndexedRecordWriter {
    rec_path: PathBuf,
    rec: BufWriter<File>,
    idx: BufWriter<File>,
    position: u64,
}

impl IndexedRecordWriter {
    pub fn create(idx_path: impl AsRef<Path>, rec_path: impl AsRef<Path>) -> Result<Self> {
        let idx_path = idx_path.as_ref();
        let rec_path = rec_path.as_ref();

        let idx = File::create(idx_path)
            .with_context(|| format!("Failed to create record index: {}", idx_path.display()))?;
        let rec = File::create(rec_path)
            .with_context(|| format!("Failed to create record file: {}", rec_path.display()))?;

        Ok(Self {
            rec_path: rec_path.to_path_buf(),
            rec: BufWriter::new(rec),
            idx: BufWriter::new(idx),
            position: 0,
        })
    }

    /// Appends `payload` under `key` and records its offset in the index.
    pub fn write_idx(&mut self, key: u64, payload: &[u8]) -> Result<()> {
        let start = self.position;
        self.write_record(payload)
            .with_context(|| format!("Failed to write key {} to {}", key, self.rec_path.display()))?;
        writeln!(self.idx, "{}\t{}", key, start).context("Failed to write index line")?;
        Ok(())
    }

    /// Flushes both files.
    pub fn finish(mut self) -> Result<()> {
        self.rec.flush().context("Failed to flush record file")?;
        self.idx.flush().context("Failed to flush record index")?;
        Ok(())
    }

    fn write_record(&mut self, payload: &[u8]) -> Result<()> {
        let aligned_len = payload.len() & !3;
        let mut part_start = 0;

        for offset in (0..aligned_len).step_by(4) {
            if (&payload[offset..offset + 4]).get_u32_le() == MAGIC {
                let cflag = if part_start == 0 {
                    Continuation::Start
                } else {
                    Continuation::Middle
                };
                self.write_frame(cflag, &payload[part_start..offset])?;
                part_start = offset + 4;
            }
        }

        let cflag = if part_start == 0 {
            Continuation::Full
        } else {
            Continuation::End
        };
        self.write_frame(cflag, &payload[part_start..])
    }

    fn write_frame(&mut self, cflag: Continuation, data: &[u8]) -> Result<()> {
        ensure!(
            data.len() <= MAX_FRAME_LEN,
            "Record part of {} bytes exceeds the frame limit of {} bytes",
            data.len(),
            MAX_FRAME_LEN
        );
        let padding = (4 - data.len() % 4) % 4;
        let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + data.len() + padding);
        put_frame_header(&mut frame, cflag, data.len());
        frame.put_slice(data);
        frame.put_bytes(0, padding);
        self.rec.write_all(&frame)?;
        self.position += frame.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recordio::IndexedRecordReader;
    use tempfile::tempdir;

    #[test]
    fn test_payload_containing_magic_round_trips() -> Result<()> {
        let dir = tempdir()?;
        let idx = dir.path().join("t.idx");
        let rec = dir.path().join("t.rec");

        let mut payload = b"head".to_vec();
        payload.put_u32_le(MAGIC);
        payload.extend_from_slice(b"middle!!");
        payload.put_u32_le(MAGIC);
        payload.extend_from_slice(b"tail-odd");
        payload.push(7);

        let mut writer = IndexedRecordWriter::create(&idx, &rec)?;
        writer.write_idx(0, &payload)?;
        writer.write_idx(1, b"plain")?;
        writer.finish()?;

        let reader = IndexedRecordReader::open(&idx, &rec)?;
        assert_eq!(&reader.read_idx(0)?[..], &payload[..]);
        assert_eq!(&reader.read_idx(1)?[..], b"plain");
        Ok(())
    }

    #[test]
    fn test_frames_are_word_aligned() -> Result<()> {
        let dir = tempdir()?;
        let idx = dir.path().join("t.idx");
        let rec = dir.path().join("t.rec");

        let mut writer = IndexedRecordWriter::create(&idx, &rec)?;
        writer.write_idx(0, b"abc")?;
        writer.write_idx(1, b"abcde")?;
        writer.finish()?;

        assert_eq!(std::fs::read_to_string(&idx)?, "0\t0\n1\t12\n");
        assert_eq!(std::fs::metadata(&rec)?.len(), 12 + 16);
        Ok(())
    }
}
