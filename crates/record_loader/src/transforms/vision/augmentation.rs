use crate::pipeline::worker_gen_bool;
use crate::transforms::Transform;
use anyhow::{ensure, Result};
use image::{imageops, DynamicImage};

// ============================================================================
// RandomHorizontalFlip
// ============================================================================

/// Mirrors the image left-to-right with probability `p`.
///
/// Draws come from the worker RNG, so a seeded pipeline flips the same
/// samples on every run.
///
/// # Example
/// ```ignore
/// let flip = RandomHorizontalFlip::new(0.5)?;
/// let augmented = flip.apply(face)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomHorizontalFlip {
    p: f64,
}

impl RandomHorizontalFlip {
    pub fn new(p: f64) -> Result<Self> {
        ensure!(
            (0.0..=1.0).contains(&p),
            "Flip probability must be in [0.0, 1.0] (got {})",
            p
        );
        Ok(Self { p })
    }

    fn flip(img: DynamicImage) -> DynamicImage {
        match img {
            DynamicImage::ImageRgb8(mut rgb) => {
                imageops::flip_horizontal_in_place(&mut rgb);
                DynamicImage::ImageRgb8(rgb)
            }
            other => other.fliph(),
        }
    }
}

impl Transform<DynamicImage, DynamicImage> for RandomHorizontalFlip {
    fn apply(&self, img: DynamicImage) -> Result<DynamicImage> {
        let flip = if self.p <= 0.0 {
            false
        } else if self.p >= 1.0 {
            true
        } else {
            worker_gen_bool(self.p)
        };
        Ok(if flip { Self::flip(img) } else { img })
    }
}
