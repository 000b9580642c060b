use crate::dataset::RecordDataset;
use crate::rank::{DeviceTarget, RankConfig};
use crate::transforms::{ColumnTransforms, ImageConfig, Mode};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::config::{PipelineConfig, DEFAULT_NUM_WORKERS};
use super::loader::Pipeline;
use super::shard::ShardInfo;

/// The face-recognition pipeline: decoded record images and labels in,
/// `{"image": [B, 3, 112, 112], "label": [B]}` batches out.
pub type FacePipeline = Pipeline<RecordDataset, ColumnTransforms>;

/// Builds the training or evaluation pipeline for the record store in
/// `dataset_path`.
///
/// The shard comes from `RANK_SIZE` / `RANK_ID`. Sample order is shuffled
/// and batches are built by 8 worker threads.
///
/// ```ignore
/// let pipeline = create_dataset("/data/faces_emore", true, 1, 32, DeviceTarget::Ascend)?;
/// for batch in pipeline.iter()? {
///     let batch = batch?;
///     let (images, labels) = (batch.images()?, batch.labels()?);
/// }
/// ```
pub fn create_dataset(
    dataset_path: impl AsRef<Path>,
    do_train: bool,
    repeat_num: usize,
    batch_size: usize,
    target: DeviceTarget,
) -> Result<FacePipeline> {
    let shard = target.shard_info(&RankConfig::from_env())?;
    let config = PipelineConfig::builder()
        .batch_size(batch_size)
        .repeat_num(repeat_num)
        .num_workers(DEFAULT_NUM_WORKERS)
        .shuffle(true)
        .build()?;
    create_dataset_with(dataset_path, Mode::from_do_train(do_train), shard, config)
}

/// Like [`create_dataset`] with the shard, mode and configuration given
/// explicitly instead of read from the environment.
pub fn create_dataset_with(
    dataset_path: impl AsRef<Path>,
    mode: Mode,
    shard: ShardInfo,
    config: PipelineConfig,
) -> Result<FacePipeline> {
    let dataset_path = dataset_path.as_ref();
    let dataset = RecordDataset::open(dataset_path)?;
    let transforms = ColumnTransforms::new(mode, &ImageConfig::default())?;

    info!(path = %dataset_path.display(), ?mode, shard = %shard, "Creating face pipeline");
    Pipeline::new(dataset, transforms, shard, config)
        .with_context(|| format!("Failed to build pipeline for {}", dataset_path.display()))
}
