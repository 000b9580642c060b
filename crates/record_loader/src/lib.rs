//! Face-recognition input pipeline over indexed record stores.
//!
//! ```ignore
//! use record_loader::{create_dataset, DeviceTarget};
//!
//! let pipeline = create_dataset("/data/faces_emore", true, 1, 32, DeviceTarget::Ascend)?;
//! for batch in pipeline.iter()? {
//!     let batch = batch?;
//!     model.step(batch.images()?, batch.labels()?);
//! }
//! ```

pub mod collator;
pub mod dataset;
pub mod minibatch;
pub mod pipeline;
pub mod rank;
pub mod recordio;
pub mod sample;
pub mod sampler;
pub mod transforms;

pub use collator::{Collator, StackCollator};
pub use dataset::{Dataset, InMemoryDataset, RecordDataset};
pub use minibatch::MiniBatch;
pub use pipeline::{
    create_dataset, create_dataset_with, FacePipeline, Pipeline, PipelineConfig, PipelineIter,
    ShardInfo, ShardPlan,
};
pub use rank::{resolve_rank, DeviceTarget, RankConfig};
pub use sample::Sample;
pub use transforms::{ColumnTransforms, ImageTransforms, Mode, Transform};
