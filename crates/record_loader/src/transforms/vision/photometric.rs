use crate::transforms::Transform;
use anyhow::{ensure, Context, Result};
use tch::Tensor;

// ============================================================================
// Normalize
// ============================================================================

/// Channel-wise standardisation of a channel-last `[H, W, C]` tensor.
///
/// ```text
/// output[h, w, c] = (input[h, w, c] - mean[c]) / std[c]
/// ```
///
/// Statistics are in the same units as the input, so raw 0-255 pixels with
/// `mean = std = 127.5` land in `[-1, 1]`.
///
/// # Example
/// ```ignore
/// let norm = Normalize::symmetric_u8();
/// let normalized = norm.apply(hwc)?;
/// ```
#[derive(Debug, Clone)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: &[f32], std: &[f32]) -> Result<Self> {
        ensure!(!mean.is_empty(), "Normalization mean cannot be empty");
        ensure!(
            mean.len() == std.len(),
            "Mean has {} channels but std has {}",
            mean.len(),
            std.len()
        );
        ensure!(
            std.iter().all(|s| *s != 0.0 && s.is_finite()),
            "Normalization std must be finite and non-zero (got {:?})",
            std
        );
        Ok(Self {
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    /// Maps 8-bit pixels onto `[-1, 1]`: mean and std of 127.5 per RGB channel.
    pub fn symmetric_u8() -> Self {
        Self {
            mean: vec![127.5; 3],
            std: vec![127.5; 3],
        }
    }
}

impl Transform<Tensor, Tensor> for Normalize {
    fn apply(&self, tensor: Tensor) -> Result<Tensor> {
        let (_height, _width, channels) = tensor
            .size3()
            .context("Normalize expects a 3D [H, W, C] tensor")?;
        ensure!(
            channels as usize == self.mean.len(),
            "Channel count mismatch: input has {} channels, normalization expects {}",
            channels,
            self.mean.len()
        );

        let shape = [1, 1, channels];
        let mean = Tensor::from_slice(&self.mean)
            .reshape(&shape)
            .to_kind(tensor.kind());
        let std = Tensor::from_slice(&self.std)
            .reshape(&shape)
            .to_kind(tensor.kind());

        Ok((tensor - mean) / std)
    }
}
