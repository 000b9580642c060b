//! Batched, sharded, parallel iteration over a dataset.
//!
//! ```text
//! pipeline/
//! ├── config.rs    → PipelineConfig + builder
//! ├── shard.rs     → ShardInfo / ShardPlan
//! ├── loader.rs    → Pipeline: sampler selection, epochs
//! ├── iterator.rs  → PipelineIter: inline or worker-backed batches
//! ├── workers.rs   → WorkerPool with per-worker channels
//! ├── thread.rs    → worker id, per-batch RNG
//! └── factory.rs   → create_dataset for record stores
//! ```

mod config;
mod factory;
mod iterator;
mod loader;
mod shard;
mod thread;
mod workers;

pub use config::{
    PipelineConfig, PipelineConfigBuilder, DEFAULT_BATCH_SIZE, DEFAULT_NUM_WORKERS,
    DEFAULT_PREFETCH_FACTOR, DEFAULT_REPEAT_NUM, DEFAULT_SHARD_SEED, MAX_REPEAT_NUM,
};
pub use factory::{create_dataset, create_dataset_with, FacePipeline};
pub use iterator::PipelineIter;
pub use loader::Pipeline;
pub use shard::{ShardInfo, ShardPlan};
pub use thread::{clear_batch_rng, current_worker_id, init_batch_rng, worker_gen_bool, WORKER_ID};
