use super::EnsureRgb;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use bytes::Bytes;
use image::DynamicImage;

// ============================================================================
// DecodeImage
// ============================================================================

/// Decodes an in-memory encoded image (JPEG, PNG, ...) to 8-bit RGB.
///
/// The container format is sniffed from the leading bytes, so record bodies
/// need no extension or type tag.
///
/// # Example
/// ```ignore
/// let (_header, body) = unpack_record(store.read_idx(key)?)?;
/// let face = DecodeImage.apply(body)?;
/// ```
#[derive(Debug, Clone)]
pub struct DecodeImage;

impl Transform<Bytes, DynamicImage> for DecodeImage {
    fn apply(&self, encoded: Bytes) -> Result<DynamicImage> {
        let image = image::load_from_memory(&encoded)
            .with_context(|| format!("Failed to decode image of {} bytes", encoded.len()))?;
        EnsureRgb.apply(image)
    }
}
