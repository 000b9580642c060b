//! Frame-level and indexed readers for `.rec` / `.idx` file pairs.

use anyhow::{anyhow, bail, Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::{get_frame_header, Continuation, FRAME_HEADER_SIZE, MAGIC};

/// Reads records sequentially from a stream of frames.
///
/// A record whose payload contained the magic word was split by the writer
/// into a `Start`, zero or more `Middle` and one `End` frame; the reader
/// stitches the parts back together, re-inserting the magic word between them.
pub struct RecordReader<R> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next record. Returns `Ok(None)` on a clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<Bytes>> {
        let mut record = BytesMut::new();
        let mut in_multipart = false;

        loop {
            let mut frame_header = [0u8; FRAME_HEADER_SIZE];
            match self.inner.read_exact(&mut frame_header) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof && !in_multipart => {
                    return Ok(None);
                }
                Err(e) => return Err(e).context("Failed to read record frame header"),
            }

            let (cflag, length) = get_frame_header(&mut &frame_header[..])?;

            match (in_multipart, cflag) {
                (false, Continuation::Full | Continuation::Start) => {}
                (true, Continuation::Middle | Continuation::End) => {}
                (in_multipart, cflag) => bail!(
                    "Unexpected {:?} frame (inside multi-part record: {})",
                    cflag,
                    in_multipart
                ),
            }

            let padded = (length + 3) & !3;
            let start = record.len();
            record.resize(start + padded, 0);
            self.inner
                .read_exact(&mut record[start..])
                .with_context(|| format!("Truncated record frame of {} bytes", length))?;
            record.truncate(start + length);

            match cflag {
                Continuation::Full | Continuation::End => return Ok(Some(record.freeze())),
                Continuation::Start | Continuation::Middle => {
                    record.put_u32_le(MAGIC);
                    in_multipart = true;
                }
            }
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Random access over a record file through its companion index file.
///
/// The index maps integer keys to byte offsets into the record file. Keys are
/// kept in index-file order. The record file handle is shared behind a mutex,
/// so one reader can serve many worker threads.
pub struct IndexedRecordReader {
    rec_path: PathBuf,
    keys: Vec<u64>,
    positions: HashMap<u64, u64>,
    file: Mutex<BufReader<File>>,
}

impl IndexedRecordReader {
    /// Opens a `.idx` / `.rec` pair for reading.
    pub fn open(idx_path: impl AsRef<Path>, rec_path: impl AsRef<Path>) -> Result<Self> {
        let idx_path = idx_path.as_ref();
        let rec_path = rec_path.as_ref();

        let index = fs::read_to_string(idx_path)
            .with_context(|| format!("Failed to read record index: {}", idx_path.display()))?;
        let (keys, positions) = parse_index(&index)
            .with_context(|| format!("Malformed record index: {}", idx_path.display()))?;

        let file = File::open(rec_path)
            .with_context(|| format!("Failed to open record file: {}", rec_path.display()))?;

        Ok(Self {
            rec_path: rec_path.to_path_buf(),
            keys,
            positions,
            file: Mutex::new(BufReader::new(file)),
        })
    }

    /// All keys, in index-file order.
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains_key(&self, key: u64) -> bool {
        self.positions.contains_key(&key)
    }

    /// Reads the record stored under `key`.
    pub fn read_idx(&self, key: u64) -> Result<Bytes> {
        let position = *self
            .positions
            .get(&key)
            .ok_or_else(|| anyhow!("Key {} not found in record index", key))?;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(position))
            .with_context(|| format!("Failed to seek to offset {} for key {}", position, key))?;

        RecordReader::new(&mut *file)
            .next_record()
            .with_context(|| {
                format!(
                    "Failed to read key {} at offset {} in {}",
                    key,
                    position,
                    self.rec_path.display()
                )
            })?
            .ok_or_else(|| anyhow!("Key {} points past the end of the record file", key))
    }
}

fn parse_index(contents: &str) -> Result<(Vec<u64>, HashMap<u64, u64>)> {
    let mut keys = Vec::new();
    let mut positions = HashMap::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (Some(key), Some(position)) = (fields.next(), fields.next()) else {
            bail!("Line {}: expected `<key>\\t<offset>`, got {:?}", line_no + 1, line);
        };
        let key: u64 = key
            .trim()
            .parse()
            .with_context(|| format!("Line {}: invalid key {:?}", line_no + 1, key))?;
        let position: u64 = position
            .trim()
            .parse()
            .with_context(|| format!("Line {}: invalid offset {:?}", line_no + 1, position))?;

        if positions.insert(key, position).is_none() {
            keys.push(key);
        }
    }
    Ok((keys, positions))
}
