#![allow(dead_code)]

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use record_loader::dataset::{TRAIN_IDX, TRAIN_REC};
use record_loader::recordio::{pack_record, IndexedRecordWriter, Label, RecordHeader};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

/// Red value of the left-most column of every synthetic face.
pub const LEFT_MARKER: u8 = 200;
/// Red value of the right-most column of every synthetic face.
pub const RIGHT_MARKER: u8 = 10;

/// Layout of a synthetic record store.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub samples: usize,
    pub width: u32,
    pub height: u32,
    /// Write a metadata record with `flag > 0` at key 0.
    pub flagged_header: bool,
}

impl StoreLayout {
    pub fn faces(samples: usize) -> Self {
        Self {
            samples,
            width: 112,
            height: 112,
            flagged_header: true,
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn unflagged(mut self) -> Self {
        self.flagged_header = false;
        self
    }
}

/// A face whose left and right columns carry distinct markers, so flips are
/// observable, and whose green channel encodes `id`.
pub fn face(id: usize, width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let red = if x == 0 {
            LEFT_MARKER
        } else if x == width - 1 {
            RIGHT_MARKER
        } else {
            ((x + y) % 256) as u8
        };
        Rgb([red, (id % 256) as u8, 128])
    }))
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Label of sample `id`. Every third sample stores a vector label whose
/// first element is the class.
pub fn label_for(id: usize) -> Label {
    if id % 3 == 0 {
        Label::Vector(vec![id as f32, 1.0])
    } else {
        Label::Scalar(id as f32)
    }
}

/// Writes `train.idx` / `train.rec` into `dir`.
///
/// With a flagged header the samples occupy keys `1..=samples` and key 0
/// holds `label = [samples + 1, samples + 1]`. Otherwise samples occupy
/// keys `0..samples`.
pub fn write_store(dir: &Path, layout: &StoreLayout) -> Result<()> {
    let mut writer = IndexedRecordWriter::create(dir.join(TRAIN_IDX), dir.join(TRAIN_REC))?;
    let first_key = if layout.flagged_header {
        let upper = (layout.samples + 1) as f32;
        let header = RecordHeader::new(vec![upper, upper], 0, 0);
        writer.write_idx(0, &pack_record(&header, &[]))?;
        1
    } else {
        0
    };

    for id in 0..layout.samples {
        let header = RecordHeader::new(label_for(id), id as u64, 0);
        let body = encode_png(&face(id, layout.width, layout.height))?;
        writer.write_idx(first_key + id as u64, &pack_record(&header, &body))?;
    }
    writer.finish()
}

pub fn temp_store(layout: &StoreLayout) -> Result<TempDir> {
    let dir = TempDir::new()?;
    write_store(dir.path(), layout)?;
    Ok(dir)
}
