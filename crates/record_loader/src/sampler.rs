use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// A `Sampler` defines the order in which dataset positions are visited.
///
/// `iter(epoch)` returns the sequence for that epoch. Randomized samplers
/// combine `epoch` with their base seed, so an epoch replays identically.
///
/// Implementations must be `Send + Sync` so the same sampler instance can be
/// shared with the pipeline iterator.
pub trait Sampler: Send + Sync {
    type Item: Send + Sync;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_>;

    /// Number of items yielded per epoch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// ============================================================================
/// Yields positions in order `(0, 1, ..., dataset_size - 1)`.
///
/// ```ignore
/// let sampler = SequentialSampler::new(5);
/// let indices: Vec<_> = sampler.iter(0).collect();
/// assert_eq!(indices, vec![0, 1, 2, 3, 4]);
/// ```
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    dataset_size: usize,
}

impl SequentialSampler {
    pub fn new(dataset_size: usize) -> Self {
        Self { dataset_size }
    }
}

impl Sampler for SequentialSampler {
    type Item = usize;

    fn iter(&self, _epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        Box::new(0..self.dataset_size)
    }

    fn len(&self) -> usize {
        self.dataset_size
    }
}

/// ============================================================================
/// A fresh permutation of `0..dataset_size` every epoch.
///
/// # Seed handling
/// - Each epoch seeds its RNG with `base_seed + epoch`, so epoch 0 uses
///   `base_seed` and epoch 1 uses `base_seed + 1`.
/// - Same seed and epoch give the same permutation; consecutive epochs differ.
///
/// ```ignore
/// let sampler = RandomSampler::new(1000, 42)?;
/// ```
#[derive(Debug, Clone)]
pub struct RandomSampler {
    dataset_size: usize,
    base_seed: u64,
}

impl RandomSampler {
    pub fn new(dataset_size: usize, base_seed: u64) -> Result<Self> {
        ensure!(
            dataset_size > 0,
            "Cannot shuffle an empty dataset (dataset_size={})",
            dataset_size
        );
        Ok(Self {
            dataset_size,
            base_seed,
        })
    }

    /// Derives a deterministic random number generator for the given epoch
    #[inline]
    fn derive_rng_for_epoch(&self, epoch: usize) -> StdRng {
        StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64))
    }
}

impl Sampler for RandomSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let mut indices: Vec<_> = (0..self.dataset_size).collect();
        indices.shuffle(&mut self.derive_rng_for_epoch(epoch));
        Box::new(indices.into_iter())
    }

    fn len(&self) -> usize {
        self.dataset_size
    }
}

/// ============================================================================
/// The slice of the sample positions read by one shard of a multi-rank job.
///
/// Every rank builds the same (optionally shuffled) ordering of
/// `0..num_samples`, so `base_seed` must agree across ranks. Shard `shard_id`
/// then takes positions `shard_id, shard_id + num_shards, ...` of it.
///
/// When `num_samples` is not a multiple of `num_shards`, `drop_last` picks
/// between truncating the ordering and padding it with positions re-read from
/// its front:
///
/// ```text
/// 10 samples, 3 shards, no shuffle
///
/// drop_last = true  (9 positions)    drop_last = false (12 positions)
///   shard 0: [0, 3, 6]                 shard 0: [0, 3, 6, 9]
///   shard 1: [1, 4, 7]                 shard 1: [1, 4, 7, 0]
///   shard 2: [2, 5, 8]                 shard 2: [2, 5, 8, 1]
/// ```
#[derive(Debug, Clone)]
pub struct DistributedSampler {
    num_samples: usize,
    num_shards: usize,
    shard_id: usize,
    shuffle: bool,
    drop_last: bool,
    base_seed: u64,
}

impl DistributedSampler {
    pub fn new(
        num_samples: usize,
        num_shards: usize,
        shard_id: usize,
        shuffle: bool,
        drop_last: bool,
        base_seed: u64,
    ) -> Result<Self> {
        ensure!(num_samples > 0, "Cannot shard an empty sample set");
        ensure!(num_shards > 0, "A sharded sampler needs at least one shard");
        ensure!(
            shard_id < num_shards,
            "Shard id {} is out of range for {} shards (valid ids: 0..={})",
            shard_id,
            num_shards,
            num_shards - 1
        );
        Ok(Self {
            num_samples,
            num_shards,
            shard_id,
            shuffle,
            drop_last,
            base_seed,
        })
    }

    /// Positions handed out across all shards in one epoch.
    ///
    /// Rounded down to a multiple of `num_shards` with `drop_last`, up
    /// otherwise; the extra positions repeat the head of the ordering.
    fn positions_per_epoch(&self) -> usize {
        let rounded_down = self.num_samples - self.num_samples % self.num_shards;
        if self.drop_last || rounded_down == self.num_samples {
            rounded_down
        } else {
            rounded_down + self.num_shards
        }
    }

    fn ordering(&self, epoch: usize) -> Vec<usize> {
        let mut positions: Vec<usize> = (0..self.num_samples).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.base_seed.wrapping_add(epoch as u64));
            positions.shuffle(&mut rng);
        }
        positions
    }
}

impl Sampler for DistributedSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        let ordering = self.ordering(epoch);
        let padded: Vec<usize> = ordering
            .iter()
            .cycle()
            .take(self.positions_per_epoch())
            .copied()
            .collect();

        Box::new(
            padded
                .into_iter()
                .skip(self.shard_id)
                .step_by(self.num_shards),
        )
    }

    fn len(&self) -> usize {
        self.positions_per_epoch() / self.num_shards
    }
}

/// ============================================================================
/// The per-sample ordering selected when a pipeline is built.
///
/// - `Sequential`: unsharded, `shuffle = false`
/// - `Random`: unsharded, `shuffle = true`
/// - `Distributed`: sharded across ranks, shuffled or not
#[derive(Debug, Clone)]
pub enum IndexSampler {
    Sequential(SequentialSampler),
    Random(RandomSampler),
    Distributed(DistributedSampler),
}

impl Sampler for IndexSampler {
    type Item = usize;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = usize> + Send + '_> {
        match self {
            IndexSampler::Sequential(s) => s.iter(epoch),
            IndexSampler::Random(s) => s.iter(epoch),
            IndexSampler::Distributed(s) => s.iter(epoch),
        }
    }

    fn len(&self) -> usize {
        match self {
            IndexSampler::Sequential(s) => s.len(),
            IndexSampler::Random(s) => s.len(),
            IndexSampler::Distributed(s) => s.len(),
        }
    }
}

/// ============================================================================
/// Wraps a [`Sampler`] to yield mini-batches of items.
///
/// Each call to `.iter(epoch)` produces successive `Vec<S::Item>` batches of up
/// to `batch_size` elements. With `drop_last`, a final short batch is discarded.
///
/// ```ignore
/// let batch_sampler = BatchSampler::new(SequentialSampler::new(1000), 32, true)?;
/// for mini_batch in batch_sampler.iter(0) {
///     assert_eq!(mini_batch.len(), 32);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BatchSampler<S> {
    sampler: S,
    batch_size: usize,
    drop_last: bool,
}

impl<S: Sampler> BatchSampler<S> {
    pub fn new(sampler: S, batch_size: usize, drop_last: bool) -> Result<Self> {
        ensure!(
            batch_size > 0,
            "batch_size must be > 0, but got batch_size={}",
            batch_size
        );
        Ok(Self {
            sampler,
            batch_size,
            drop_last,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn inner(&self) -> &S {
        &self.sampler
    }
}

impl<S: Sampler> Sampler for BatchSampler<S> {
    type Item = Vec<S::Item>;

    fn iter(&self, epoch: usize) -> Box<dyn Iterator<Item = Self::Item> + Send + '_> {
        let mut sampler_iter = self.sampler.iter(epoch);
        let batch_size = self.batch_size;
        let drop_last = self.drop_last;

        Box::new(std::iter::from_fn(move || {
            let mut mini_batch = Vec::with_capacity(batch_size);
            for _ in 0..batch_size {
                if let Some(item) = sampler_iter.next() {
                    mini_batch.push(item);
                } else {
                    break;
                }
            }
            if mini_batch.len() == batch_size || (!drop_last && !mini_batch.is_empty()) {
                Some(mini_batch)
            } else {
                None
            }
        }))
    }

    fn len(&self) -> usize {
        let items = self.sampler.len();
        if self.drop_last {
            items / self.batch_size
        } else {
            items.div_ceil(self.batch_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, InMemoryDataset};
    use std::collections::HashSet;

    const TEST_SEED: u64 = 42;
    const TEST_DATASET_SIZE: usize = 100;

    mod sequential_sampler_tests {
        use super::*;

        #[test]
        fn yields_sequential_indices() {
            let sampler = SequentialSampler::new(100);
            let indices: Vec<usize> = sampler.iter(0).collect();
            assert_eq!(indices, (0..100).collect::<Vec<_>>());
            assert_eq!(sampler.len(), 100);
        }

        #[test]
        fn handles_empty_dataset() {
            let sampler = SequentialSampler::new(0);
            assert_eq!(sampler.iter(0).count(), 0);
            assert!(sampler.is_empty());
        }
    }

    mod random_sampler_tests {
        use super::*;

        #[test]
        fn validates_parameters() {
            assert!(RandomSampler::new(10, TEST_SEED).is_ok());
            assert!(RandomSampler::new(0, TEST_SEED).is_err());
        }

        #[test]
        fn contains_all_indices() {
            let sampler = RandomSampler::new(TEST_DATASET_SIZE, TEST_SEED).unwrap();
            let samples: Vec<_> = sampler.iter(0).collect();
            assert_eq!(samples.len(), TEST_DATASET_SIZE);
            assert_eq!(HashSet::<_>::from_iter(samples).len(), TEST_DATASET_SIZE);
        }

        #[test]
        fn produces_deterministic_results() {
            let sampler = RandomSampler::new(TEST_DATASET_SIZE, TEST_SEED).unwrap();
            let epoch1 = sampler.iter(1).collect::<Vec<_>>();
            assert_eq!(epoch1, sampler.iter(1).collect::<Vec<_>>());
            assert_ne!(epoch1, sampler.iter(2).collect::<Vec<_>>());
        }
    }

    mod batch_sampler_tests {
        use super::*;

        #[test]
        fn test_batches_full() {
            let base_sampler = SequentialSampler::new(10);
            let batch_sampler = BatchSampler::new(base_sampler, 2, false).unwrap();
            let mini_batches: Vec<_> = batch_sampler.iter(0).collect();
            assert_eq!(
                mini_batches,
                vec![vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7], vec![8, 9]]
            );
            assert_eq!(batch_sampler.len(), 5);
        }

        #[test]
        fn test_batches_drop_last() {
            let base_sampler = SequentialSampler::new(10);
            let batch_sampler = BatchSampler::new(base_sampler, 3, true).unwrap();
            let mini_batches: Vec<_> = batch_sampler.iter(0).collect();
            assert_eq!(
                mini_batches,
                vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]
            );
            assert_eq!(batch_sampler.len(), 3);
        }

        #[test]
        fn test_batch_larger_than_dataset_yields_nothing() {
            let batch_sampler = BatchSampler::new(SequentialSampler::new(10), 32, true).unwrap();
            assert_eq!(batch_sampler.iter(0).count(), 0);
            assert_eq!(batch_sampler.len(), 0);
            assert!(BatchSampler::new(SequentialSampler::new(10), 0, true).is_err());
        }

        #[test]
        fn test_integration_with_dataset() -> Result<()> {
            let dataset = InMemoryDataset::new(vec![1, 2, 3]);
            let sampler = BatchSampler::new(SequentialSampler::new(dataset.len()), 2, false)?;

            let mut all_values = Vec::new();
            for batch_indices in sampler.iter(0) {
                for idx in batch_indices {
                    all_values.push(dataset.get(idx)?);
                }
            }
            assert_eq!(all_values, vec![1, 2, 3]);
            Ok(())
        }
    }

    mod distributed_sampler_tests {
        use super::*;

        #[test]
        fn rejects_invalid_args() {
            assert!(DistributedSampler::new(0, 1, 0, false, false, TEST_SEED).is_err());
            assert!(DistributedSampler::new(10, 0, 0, false, false, TEST_SEED).is_err());

            let err = DistributedSampler::new(10, 2, 2, false, false, TEST_SEED).unwrap_err();
            let message = err.to_string();
            assert!(message.contains("Shard id 2"), "{}", message);
            assert!(message.contains("0..=1"), "{}", message);
        }

        #[test]
        fn even_split_needs_no_padding() -> Result<()> {
            let sampler = DistributedSampler::new(12, 3, 1, false, false, TEST_SEED)?;
            assert_eq!(sampler.iter(0).collect::<Vec<_>>(), vec![1, 4, 7, 10]);
            assert_eq!(sampler.len(), 4);
            Ok(())
        }

        #[test]
        fn drop_last_true_truncates_indices() -> Result<()> {
            let sampler = DistributedSampler::new(10, 3, 2, false, true, TEST_SEED)?;
            let indices: Vec<_> = sampler.iter(0).collect();
            assert_eq!(indices, vec![2, 5, 8]);
            assert_eq!(sampler.len(), 3);
            Ok(())
        }

        #[test]
        fn drop_last_false_correctly_pads_indices_by_cycling() -> Result<()> {
            let sampler = DistributedSampler::new(10, 3, 2, false, false, TEST_SEED)?;
            let indices: Vec<_> = sampler.iter(0).collect();
            assert_eq!(indices, vec![2, 5, 8, 1]);
            assert_eq!(sampler.len(), 4);
            Ok(())
        }

        #[test]
        fn shuffles_deterministically() -> Result<()> {
            let sampler = DistributedSampler::new(100, 4, 0, true, false, TEST_SEED)?;

            let epoch1_a: Vec<_> = sampler.iter(1).collect();
            let epoch1_b: Vec<_> = sampler.iter(1).collect();
            assert_eq!(epoch1_a, epoch1_b);

            let epoch2: Vec<_> = sampler.iter(2).collect();
            assert_ne!(epoch1_a, epoch2);
            Ok(())
        }

        #[test]
        fn shards_cover_dataset_disjointly() -> Result<()> {
            let shards = (0..4)
                .map(|shard_id| {
                    Ok(DistributedSampler::new(100, 4, shard_id, true, false, TEST_SEED)?
                        .iter(0)
                        .collect::<HashSet<_>>())
                })
                .collect::<Result<Vec<_>>>()?;

            for (i, a) in shards.iter().enumerate() {
                assert_eq!(a.len(), 25);
                for b in &shards[i + 1..] {
                    assert!(a.is_disjoint(b));
                }
            }
            let all: HashSet<_> = shards.iter().flatten().collect();
            assert_eq!(all.len(), 100);
            Ok(())
        }

        #[test]
        fn single_shard_gets_all_indices() -> Result<()> {
            let sampler = DistributedSampler::new(5, 1, 0, true, false, TEST_SEED)?;
            let mut indices: Vec<_> = sampler.iter(0).collect();
            indices.sort_unstable();
            assert_eq!(indices, vec![0, 1, 2, 3, 4]);
            Ok(())
        }
    }

    #[test]
    fn index_sampler_dispatches() -> Result<()> {
        let seq = IndexSampler::Sequential(SequentialSampler::new(4));
        assert_eq!(seq.iter(0).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let dist = IndexSampler::Distributed(DistributedSampler::new(4, 2, 1, false, false, 0)?);
        assert_eq!(dist.iter(0).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(dist.len(), 2);
        Ok(())
    }
}
