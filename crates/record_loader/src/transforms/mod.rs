pub mod columns;
pub mod core;
pub mod label;
pub mod vision;

pub use columns::{ColumnTransforms, ImageConfig, ImageTransforms, Mode};
pub use core::{Chain, Transform};
pub use label::LabelToTensor;
