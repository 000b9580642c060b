use crate::transforms::Transform;
use anyhow::Result;
use tch::{Device, Kind, Tensor};

/// Casts a class label to a 0-d int32 tensor.
///
/// Stacking `B` of these yields the `[B]` label column of a batch.
#[derive(Debug, Clone)]
pub struct LabelToTensor;

impl Transform<i32, Tensor> for LabelToTensor {
    fn apply(&self, label: i32) -> Result<Tensor> {
        Ok(Tensor::scalar_tensor(label as i64, (Kind::Int, Device::Cpu)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_is_int32_scalar() -> Result<()> {
        let t = LabelToTensor.apply(9_999)?;
        assert_eq!(t.kind(), Kind::Int);
        assert!(t.size().is_empty());
        assert_eq!(t.int64_value(&[]), 9_999);
        Ok(())
    }
}
