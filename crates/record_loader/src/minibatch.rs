use crate::collator::Collator;
use crate::sample::{Sample, IMAGE_COLUMN, LABEL_COLUMN};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tch::{Device, Tensor};

/// A batch of samples stacked along dim 0, keyed by column name.
///
/// For the face pipeline with batch size `B`:
/// - `"image"` -> `[B, 3, 112, 112]` float
/// - `"label"` -> `[B]` int32
#[derive(Debug)]
pub struct MiniBatch {
    pub tensors: HashMap<String, Tensor>,
}

impl MiniBatch {
    /// Batches `samples` with the given [`Collator`].
    ///
    /// ```ignore
    /// let batch = MiniBatch::collate(samples, &StackCollator)?;
    /// ```
    pub fn collate(samples: Vec<Sample>, collator: &impl Collator) -> Result<Self> {
        collator.collate(&samples)
    }

    /// Returns the number of samples in the batch.
    pub fn batch_size(&self) -> Result<i64> {
        self.tensors
            .values()
            .next()
            .map(|t| t.size()[0])
            .ok_or(anyhow!("Empty mini-batch"))
    }

    pub fn get(&self, feature: &str) -> Result<&Tensor> {
        self.tensors
            .get(feature)
            .ok_or_else(|| anyhow!("Feature '{}' not found in mini-batch", feature))
    }

    pub fn images(&self) -> Result<&Tensor> {
        self.get(IMAGE_COLUMN)
    }

    pub fn labels(&self) -> Result<&Tensor> {
        self.get(LABEL_COLUMN)
    }

    /// Returns an iterator over all column names in the batch.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    /// Transfers all tensors to the target device (CPU/GPU)
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            tensors: self
                .tensors
                .iter()
                .map(|(feature_name, tensor)| (feature_name.clone(), tensor.to_device(device)))
                .collect(),
        }
    }
}
