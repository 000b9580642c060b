use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, RgbImage};

// ============================================================================
// EnsureRgb
// ============================================================================

/// Converts any colour type to 8-bit RGB; RGB input passes through untouched.
#[derive(Debug, Clone)]
pub struct EnsureRgb;

impl Transform<DynamicImage, DynamicImage> for EnsureRgb {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        Ok(match img {
            DynamicImage::ImageRgb8(_) => img,
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        })
    }
}

// ============================================================================
// Resize
// ============================================================================

/// Scales the shorter side to `size`, keeping the aspect ratio.
///
/// A 300x600 image resized to 256 becomes 256x512. The longer side is
/// truncated, never rounded up.
#[derive(Debug, Clone)]
pub struct Resize {
    size: u32,
    filter: FilterType,
}

impl Resize {
    /// Bilinear resize of the shorter side.
    pub fn new(size: u32) -> Result<Self> {
        Self::with_filter(size, FilterType::Triangle)
    }

    pub fn with_filter(size: u32, filter: FilterType) -> Result<Self> {
        ensure!(size > 0, "Resize target must be positive (got {})", size);
        Ok(Self { size, filter })
    }

    fn target_dims(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let (short, long) = (width.min(height), width.max(height));
        let scaled = u32::try_from(long as u64 * self.size as u64 / short as u64)
            .with_context(|| {
                format!(
                    "Resizing {}x{} to a shorter side of {} overflows the longer side",
                    width, height, self.size
                )
            })?
            .max(1);
        Ok(if width <= height {
            (self.size, scaled)
        } else {
            (scaled, self.size)
        })
    }
}

impl Transform<DynamicImage, DynamicImage> for Resize {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Cannot resize an empty image ({}x{})",
            width,
            height
        );
        let (new_width, new_height) = self.target_dims(width, height)?;
        if (new_width, new_height) == (width, height) {
            return Ok(img);
        }
        Ok(img.resize_exact(new_width, new_height, self.filter))
    }
}

// ============================================================================
// CenterCrop
// ============================================================================

/// Cuts a `size`x`size` window from the centre of the image.
///
/// Images smaller than the window along an axis are padded with black on
/// both sides of that axis instead, so the output is always `size`x`size`.
#[derive(Debug, Clone)]
pub struct CenterCrop {
    size: u32,
}

impl CenterCrop {
    pub fn new(size: u32) -> Result<Self> {
        ensure!(size > 0, "Crop size must be positive (got {})", size);
        Ok(Self { size })
    }
}

impl Transform<DynamicImage, DynamicImage> for CenterCrop {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let (width, height) = img.dimensions();
        if width >= self.size && height >= self.size {
            let left = (width - self.size) / 2;
            let top = (height - self.size) / 2;
            return Ok(img.crop_imm(left, top, self.size, self.size));
        }

        // At least one side is short: paste the image centred onto a black canvas.
        let rgb = img.to_rgb8();
        let mut canvas = RgbImage::new(self.size, self.size);
        let x = (self.size as i64 - width as i64) / 2;
        let y = (self.size as i64 - height as i64) / 2;
        imageops::overlay(&mut canvas, &rgb, x, y);
        Ok(DynamicImage::ImageRgb8(canvas))
    }
}
