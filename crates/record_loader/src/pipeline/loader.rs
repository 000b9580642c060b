use crate::collator::StackCollator;
use crate::dataset::Dataset;
use crate::sample::Sample;
use crate::sampler::{
    BatchSampler, DistributedSampler, IndexSampler, RandomSampler, Sampler, SequentialSampler,
};
use crate::transforms::Transform;
use anyhow::{anyhow, ensure, Context, Result};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::{PipelineConfig, DEFAULT_SHARD_SEED};
use super::iterator::PipelineIter;
use super::shard::{ShardInfo, ShardPlan};

/// Batched, shard-aware view over a [`Dataset`].
///
/// ```text
/// source sampler ─▶ batch (drop_last) ─▶ transform + collate ─▶ repeat
///  random | sequential | distributed          (workers)
/// ```
///
/// Each [`iter`](Self::iter) call runs `repeat_num` epochs and advances the
/// epoch counter, so consecutive calls see fresh shuffles.
pub struct Pipeline<D, T> {
    pub(crate) dataset: Arc<D>,
    pub(crate) transform: Arc<T>,
    pub(crate) collator: StackCollator,
    pub(crate) batch_sampler: BatchSampler<IndexSampler>,
    pub(crate) shard: ShardInfo,
    pub(crate) config: PipelineConfig,
    pub(crate) runtime_seed: u64,
    pub(crate) current_epoch: AtomicUsize,
}

impl<D, T> std::fmt::Debug for Pipeline<D, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("shard", &self.shard)
            .field("config", &self.config)
            .field("runtime_seed", &self.runtime_seed)
            .field("batches_per_epoch", &self.batch_sampler.len())
            .finish()
    }
}

impl<D, T> Pipeline<D, T>
where
    D: Dataset + 'static,
    D::Item: 'static,
    T: Transform<D::Item, Sample> + 'static,
{
    pub fn new(dataset: D, transform: T, shard: ShardInfo, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let dataset_len = dataset.len();
        ensure!(dataset_len > 0, "Cannot build a pipeline over an empty dataset");

        let (sampler, runtime_seed) = match shard.plan() {
            ShardPlan::Unsharded => {
                let seed = config.seed.unwrap_or_else(|| rand::rng().random());
                let sampler = if config.shuffle {
                    IndexSampler::Random(RandomSampler::new(dataset_len, seed)?)
                } else {
                    IndexSampler::Sequential(SequentialSampler::new(dataset_len))
                };
                (sampler, seed)
            }
            ShardPlan::Sharded {
                num_shards,
                shard_id,
            } => {
                let seed = config.seed.unwrap_or(DEFAULT_SHARD_SEED);
                let sampler = DistributedSampler::new(
                    dataset_len,
                    num_shards,
                    shard_id,
                    config.shuffle,
                    false,
                    seed,
                )
                .with_context(|| format!("Invalid shard {}", shard))?;
                (IndexSampler::Distributed(sampler), seed)
            }
        };

        let batch_sampler = BatchSampler::new(sampler, config.batch_size, true)?;
        if batch_sampler.is_empty() {
            warn!(
                shard_len = batch_sampler.inner().len(),
                batch_size = config.batch_size,
                "Shard is smaller than one batch; the pipeline yields nothing"
            );
        }
        info!(
            samples = dataset_len,
            shard = %shard,
            batch_size = config.batch_size,
            batches_per_epoch = batch_sampler.len(),
            repeat_num = config.repeat_num,
            num_workers = config.num_workers,
            shuffle = config.shuffle,
            "Built pipeline"
        );

        Ok(Self {
            dataset: Arc::new(dataset),
            transform: Arc::new(transform),
            collator: StackCollator,
            batch_sampler,
            shard,
            config,
            runtime_seed,
            current_epoch: AtomicUsize::new(0),
        })
    }

    /// Starts `repeat_num` epochs of batches.
    pub fn iter(&self) -> Result<PipelineIter<'_, D, T>> {
        let repeat_num = self.config.repeat_num;
        let first_epoch = self
            .current_epoch
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |epoch| {
                epoch.checked_add(repeat_num)
            })
            .map_err(|epoch| anyhow!("Epoch counter exhausted at epoch {}", epoch))?;
        PipelineIter::new(self, first_epoch)
    }

    /// Full batches per epoch: `floor(shard_len / batch_size)`.
    pub fn batches_per_epoch(&self) -> usize {
        self.batch_sampler.len()
    }

    /// Batches yielded by one call to [`iter`](Self::iter).
    pub fn len(&self) -> usize {
        self.batches_per_epoch().saturating_mul(self.config.repeat_num)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn shard(&self) -> ShardInfo {
        self.shard
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Seed actually used for shuffling and random transforms.
    pub fn seed(&self) -> u64 {
        self.runtime_seed
    }

    /// Epochs started so far across all iterators.
    pub fn epoch(&self) -> usize {
        self.current_epoch.load(Ordering::SeqCst)
    }
}
