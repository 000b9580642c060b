//! Image preprocessing and augmentation.
//!
//! ```text
//! transforms/vision/
//! ├── io.rs            → encoded bytes → DynamicImage
//! ├── geometric.rs     → resize, center crop
//! ├── augmentation.rs  → random horizontal flip
//! ├── conversion.rs    → image → [H, W, C] tensor, HWC → CHW
//! └── photometric.rs   → channel normalization
//! ```
//!
//! Everything is re-exported here:
//!
//! ```ignore
//! use crate::transforms::Transform;
//! use crate::transforms::vision::{HwcToChw, Normalize, RandomHorizontalFlip, ToHwcTensor};
//!
//! let train = RandomHorizontalFlip::new(0.5)?
//!     .then(ToHwcTensor)
//!     .then(Normalize::symmetric_u8())
//!     .then(HwcToChw);
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::RandomHorizontalFlip;
pub use conversion::{HwcToChw, ToHwcTensor};
pub use geometric::{CenterCrop, EnsureRgb, Resize};
pub use io::DecodeImage;
pub use photometric::Normalize;
