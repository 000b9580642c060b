use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use image::{DynamicImage, GenericImageView};
use tch::{Kind, Tensor};

// ============================================================================
// ToHwcTensor
// ============================================================================

/// Converts an image to a channel-last `[H, W, 3]` f32 tensor.
///
/// Pixel values keep their 0-255 range; scaling is left to [`Normalize`].
/// Non-RGB images are converted to RGB first.
///
/// [`Normalize`]: super::Normalize
#[derive(Debug, Clone)]
pub struct ToHwcTensor;

impl Transform<DynamicImage, Tensor> for ToHwcTensor {
    fn apply(&self, img: DynamicImage) -> Result<Tensor> {
        let (width, height) = img.dimensions();
        ensure!(
            width > 0 && height > 0,
            "Image dimensions must be positive (got {}x{})",
            width,
            height
        );

        let rgb = match img {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };
        Tensor::from_slice(rgb.as_raw())
            .f_reshape(&[height as i64, width as i64, 3])
            .and_then(|t| t.f_to_kind(Kind::Float))
            .context("Failed to build HWC tensor from image")
    }
}

// ============================================================================
// HwcToChw
// ============================================================================

/// Moves the channel axis first: `[H, W, C]` -> `[C, H, W]`.
#[derive(Debug, Clone)]
pub struct HwcToChw;

impl Transform<Tensor, Tensor> for HwcToChw {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        ensure!(
            tensor.dim() == 3,
            "Expected a 3D [H, W, C] tensor, got shape {:?}",
            tensor.size()
        );
        // Contiguous so batching copies a dense block per sample.
        Ok(tensor.permute(&[2, 0, 1]).contiguous())
    }
}
