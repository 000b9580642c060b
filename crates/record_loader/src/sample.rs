use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tch::Tensor;

/// Column holding the `[3, H, W]` float image.
pub const IMAGE_COLUMN: &str = "image";
/// Column holding the 0-d int32 class label.
pub const LABEL_COLUMN: &str = "label";

/// A single transformed example: column name -> tensor.
///
/// The face pipeline produces exactly two columns,
/// `{"image": Tensor[3, 112, 112], "label": Tensor[]}`.
#[derive(Debug)]
pub struct Sample {
    pub features: HashMap<String, Tensor>,
}

/// Creates a shallow clone of the `Sample`
impl Clone for Sample {
    fn clone(&self) -> Self {
        let features = self
            .features
            .iter()
            .map(|(k, v)| (k.clone(), v.shallow_clone()))
            .collect();
        Self { features }
    }
}

impl Sample {
    pub fn new(features: HashMap<String, Tensor>) -> Self {
        Self { features }
    }

    /// Creates a `Sample` from a single `(column, tensor)` pair.
    ///
    /// Chain with [`with_feature`](Self::with_feature) to add more columns.
    pub fn from_single(name: impl Into<String>, tensor: Tensor) -> Self {
        Self {
            features: HashMap::from([(name.into(), tensor)]),
        }
    }

    /// Adds or overwrites a column.
    pub fn with_feature(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.features.insert(name.into(), tensor);
        self
    }

    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.features
            .get(feature)
            .ok_or_else(|| anyhow!("Feature {} not found", feature))
    }

    pub fn image(&self) -> Result<&Tensor> {
        self.get(IMAGE_COLUMN)
    }

    pub fn label(&self) -> Result<&Tensor> {
        self.get(LABEL_COLUMN)
    }

    /// Returns an iterator over all column names in this `Sample`.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }
}
