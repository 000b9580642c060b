use crate::recordio::{unpack_record, IndexedRecordReader, Label, RecordHeader};
use crate::transforms::vision::DecodeImage;
use crate::transforms::Transform;
use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Index file name inside a record store directory.
pub const TRAIN_IDX: &str = "train.idx";
/// Record file name inside a record store directory.
pub const TRAIN_REC: &str = "train.rec";

/// Random-access collection of samples.
///
/// Positions run over `0..len()`. Implementations must be `Send + Sync`
/// so pipeline workers can read concurrently.
pub trait Dataset: Send + Sync {
    type Item: Send;

    fn len(&self) -> usize;

    /// Produces the sample at `index`. Out-of-bounds positions are an error.
    fn get(&self, index: usize) -> Result<Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        (**self).len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        (**self).get(index)
    }
}

/// ============================================================================
/// Face images and identity labels read from a `train.rec` / `train.idx` pair.
///
/// The record under key 0 decides which keys are samples:
/// - header `flag > 0`: key 0 is a metadata record and samples are keys
///   `1..N` with `N = label[0]`
/// - header `flag == 0`: every key in the index file is a sample, in file order
///
/// Samples are decoded on every [`get`](Dataset::get); nothing is cached.
///
/// ```ignore
/// let dataset = RecordDataset::open("/data/faces_emore")?;
/// let (image, label) = dataset.get(0)?;
/// ```
pub struct RecordDataset {
    root: PathBuf,
    reader: IndexedRecordReader,
    header: Option<RecordHeader>,
    keys: Vec<u64>,
}

impl std::fmt::Debug for RecordDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordDataset")
            .field("root", &self.root)
            .field("header", &self.header)
            .field("len", &self.keys.len())
            .finish()
    }
}

impl RecordDataset {
    /// Opens `root/train.idx` and `root/train.rec` and computes the sample keys.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let reader = IndexedRecordReader::open(root.join(TRAIN_IDX), root.join(TRAIN_REC))
            .with_context(|| format!("Failed to open record store in {}", root.display()))?;

        let (header, _) = unpack_record(
            reader
                .read_idx(0)
                .context("Failed to read header record (key 0)")?,
        )
        .context("Failed to unpack header record (key 0)")?;

        let (header, keys) = if header.flag > 0 {
            let upper = header
                .label
                .first()
                .ok_or_else(|| anyhow!("Header record has flag {} but no label values", header.flag))?
                as i64;
            let keys: Vec<u64> = (1..upper.max(1) as u64).collect();
            (Some(header), keys)
        } else {
            (None, reader.keys().to_vec())
        };

        if keys.is_empty() {
            warn!(root = %root.display(), "Record store has no samples");
        }
        info!(
            root = %root.display(),
            records = reader.len(),
            samples = keys.len(),
            has_header = header.is_some(),
            "Opened record store"
        );

        Ok(Self {
            root: root.to_path_buf(),
            reader,
            header,
            keys,
        })
    }

    /// The metadata record at key 0, present only when its `flag > 0`.
    pub fn header(&self) -> Option<&RecordHeader> {
        self.header.as_ref()
    }

    /// Record keys of the samples, in sample order.
    pub fn keys(&self) -> &[u64] {
        &self.keys
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads and unpacks the record at `index` without decoding the image.
    pub fn get_raw(&self, index: usize) -> Result<(RecordHeader, bytes::Bytes)> {
        let key = *self.keys.get(index).ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of {} samples",
                index,
                self.keys.len()
            )
        })?;
        let payload = self.reader.read_idx(key)?;
        unpack_record(payload).with_context(|| format!("Failed to unpack record {}", key))
    }
}

impl Dataset for RecordDataset {
    type Item = (DynamicImage, i32);

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn get(&self, index: usize) -> Result<Self::Item> {
        let (header, body) = self.get_raw(index)?;
        let label = class_label(&header.label)
            .with_context(|| format!("Invalid label at index {}", index))?;
        let image = DecodeImage
            .apply(body)
            .with_context(|| format!("Failed to decode image at index {}", index))?;
        Ok((image, label))
    }
}

/// Class id of a stored label: the scalar, or the first element of a vector,
/// truncated toward zero.
pub fn class_label(label: &Label) -> Result<i32> {
    label
        .first()
        .map(|value| value as i32)
        .ok_or_else(|| anyhow!("Empty label vector"))
}

/// ============================================================================
/// A dataset backed by a shared slice of ready-made items.
///
/// Cloning only bumps the `Arc` counter.
#[derive(Debug, Clone)]
pub struct InMemoryDataset<T> {
    items: Arc<[T]>,
}

impl<T> InMemoryDataset<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

impl<T: Clone + Send + Sync> Dataset for InMemoryDataset<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        self.items.get(index).cloned().ok_or_else(|| {
            anyhow!(
                "Index {} out of bounds for dataset of {} items",
                index,
                self.items.len()
            )
        })
    }
}
