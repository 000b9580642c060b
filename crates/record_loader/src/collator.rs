use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use anyhow::{anyhow, bail, Result};
use std::collections::{HashMap, HashSet};
use tch::Tensor;

/// Combines multiple [`Sample`]s into a [`MiniBatch`].
pub trait Collator: Send + Sync {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch>;
}

/// Stacks same-shaped column tensors along a new batch dimension (dim 0).
///
/// `B` images of `[3, 112, 112]` become `[B, 3, 112, 112]` and `B` scalar
/// labels become `[B]`. Samples with differing columns or shapes are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackCollator;

impl Collator for StackCollator {
    fn collate(&self, samples: &[Sample]) -> Result<MiniBatch> {
        if samples.is_empty() {
            bail!("Cannot collate empty sample list");
        }

        let first_keys: HashSet<&String> = samples[0].features.keys().collect();
        for (i, sample) in samples.iter().enumerate().skip(1) {
            let missing_keys: Vec<&String> = first_keys
                .iter()
                .filter(|&&k| !sample.features.contains_key(k))
                .cloned()
                .collect();

            let extra_keys: Vec<&String> = sample
                .features
                .keys()
                .filter(|k| !first_keys.contains(k))
                .collect();

            if !missing_keys.is_empty() || !extra_keys.is_empty() {
                bail!(
                    "Sample #{} has mismatch feature keys:\n -Missing: {:?}\n -Extra: {:?}",
                    i,
                    missing_keys,
                    extra_keys
                )
            }
        }

        let mut tensors = HashMap::with_capacity(first_keys.len());
        for key in first_keys {
            let tensors_to_stack = samples
                .iter()
                .map(|s| {
                    s.features
                        .get(key)
                        .ok_or_else(|| anyhow!("Feature '{}' vanished during collation", key))
                })
                .collect::<Result<Vec<&Tensor>>>()?;

            let reference_shape = tensors_to_stack[0].size();
            for (i, tensor) in tensors_to_stack.iter().enumerate() {
                if tensor.size() != reference_shape {
                    bail!(
                        "Shape mismatch in sample {} for feature '{}': expected {:?}, got {:?}",
                        i,
                        key,
                        reference_shape,
                        tensor.size()
                    );
                }
            }

            tensors.insert(key.clone(), Tensor::stack(&tensors_to_stack, 0));
        }
        Ok(MiniBatch { tensors })
    }
}

#[cfg(test)]
mod stackcollator_tests {
    use super::*;
    use crate::sample::{IMAGE_COLUMN, LABEL_COLUMN};
    use tch::{Device, Kind};

    fn face_sample(fill: f64, label: i64) -> Sample {
        Sample::from_single(
            IMAGE_COLUMN,
            Tensor::full(&[3, 8, 8], fill, (Kind::Float, Device::Cpu)),
        )
        .with_feature(
            LABEL_COLUMN,
            Tensor::scalar_tensor(label, (Kind::Int, Device::Cpu)),
        )
    }

    #[test]
    fn test_stack_scalar_labels_and_images() -> Result<()> {
        let samples = vec![face_sample(0.0, 4), face_sample(1.0, 7)];
        let batch = StackCollator.collate(&samples)?;

        let images = batch.get(IMAGE_COLUMN)?;
        assert_eq!(images.size(), vec![2, 3, 8, 8]);
        assert_eq!(images.double_value(&[1, 2, 7, 7]), 1.0);

        let labels = batch.get(LABEL_COLUMN)?;
        assert_eq!(labels.size(), vec![2]);
        assert_eq!(labels.kind(), Kind::Int);
        assert_eq!(labels.int64_value(&[0]), 4);
        assert_eq!(labels.int64_value(&[1]), 7);
        Ok(())
    }

    #[test]
    fn test_empty_and_mismatched_inputs() {
        assert!(StackCollator.collate(&[]).is_err());

        let small = Sample::from_single(
            IMAGE_COLUMN,
            Tensor::zeros(&[3, 4, 4], (Kind::Float, Device::Cpu)),
        );
        let large = Sample::from_single(
            IMAGE_COLUMN,
            Tensor::zeros(&[3, 5, 5], (Kind::Float, Device::Cpu)),
        );
        assert!(StackCollator.collate(&[small.clone(), large]).is_err());

        let labelled = face_sample(0.0, 1);
        assert!(StackCollator.collate(&[labelled, small]).is_err());
    }
}
