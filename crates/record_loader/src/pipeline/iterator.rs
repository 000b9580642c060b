//! Iteration over a [`Pipeline`].
//!
//! - `num_workers = 0`: batches are built on the calling thread.
//! - `num_workers > 0`: a fresh [`WorkerPool`] is spawned per `iter()` call
//!   and torn down when the iterator finishes or is dropped.
//!
//! Both modes produce identical batches for the same seed: the transform RNG
//! is reseeded from `(seed, epoch, batch)` before every batch.

use crate::collator::{Collator, StackCollator};
use crate::dataset::Dataset;
use crate::minibatch::MiniBatch;
use crate::sample::Sample;
use crate::sampler::Sampler;
use crate::transforms::Transform;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::loader::Pipeline;
use super::thread::{clear_batch_rng, init_batch_rng};
use super::workers::{run_worker, WorkerPool};

/// One batch of work: sample positions plus what is needed to seed its RNG.
#[derive(Debug)]
pub(crate) struct BatchTask {
    epoch: usize,
    batch: usize,
    indices: Vec<usize>,
}

enum IterMode<'a, D, T> {
    Inline {
        pipeline: &'a Pipeline<D, T>,
    },
    Workers {
        pool: WorkerPool<BatchTask, Result<MiniBatch>>,
        pending: usize,
        dispatched: usize,
        received: usize,
        capacity: usize,
    },
    Done,
}

/// Iterator over the batches of `repeat_num` epochs.
///
/// Created by [`Pipeline::iter`]. Iteration stops after the first error.
pub struct PipelineIter<'a, D, T> {
    tasks: Box<dyn Iterator<Item = BatchTask> + Send + 'a>,
    mode: IterMode<'a, D, T>,
    timeout: Duration,
    seed: u64,
}

impl<'a, D, T> PipelineIter<'a, D, T>
where
    D: Dataset + 'static,
    D::Item: 'static,
    T: Transform<D::Item, Sample> + 'static,
{
    pub(crate) fn new(pipeline: &'a Pipeline<D, T>, first_epoch: usize) -> Result<Self> {
        let config = &pipeline.config;
        let sampler = &pipeline.batch_sampler;
        let tasks = Box::new(
            (first_epoch..first_epoch + config.repeat_num).flat_map(move |epoch| {
                sampler
                    .iter(epoch)
                    .enumerate()
                    .map(move |(batch, indices)| BatchTask {
                        epoch,
                        batch,
                        indices,
                    })
            }),
        );

        let mode = if config.num_workers == 0 {
            IterMode::Inline { pipeline }
        } else {
            let dataset = Arc::clone(&pipeline.dataset);
            let transform = Arc::clone(&pipeline.transform);
            let collator = pipeline.collator;
            let seed = pipeline.runtime_seed;
            let poll_interval = config.worker_poll_interval;

            let pool = WorkerPool::new(
                config.num_workers,
                config.prefetch_factor,
                move |task_rx, output_tx, shutdown| {
                    run_worker(task_rx, output_tx, shutdown, poll_interval, |task| {
                        build_batch(&*dataset, &*transform, &collator, seed, task)
                    })
                },
            )
            .context("Failed to start pipeline workers")?;

            IterMode::Workers {
                pool,
                pending: 0,
                dispatched: 0,
                received: 0,
                capacity: config.num_workers * config.prefetch_factor,
            }
        };

        Ok(Self {
            tasks,
            mode,
            timeout: config.timeout,
            seed: pipeline.runtime_seed,
        })
    }
}

impl<D, T> Iterator for PipelineIter<'_, D, T>
where
    D: Dataset + 'static,
    D::Item: 'static,
    T: Transform<D::Item, Sample> + 'static,
{
    type Item = Result<MiniBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = match &mut self.mode {
            IterMode::Done => return None,
            IterMode::Inline { pipeline } => match self.tasks.next() {
                Some(task) => build_batch(
                    &*pipeline.dataset,
                    &*pipeline.transform,
                    &pipeline.collator,
                    self.seed,
                    task,
                ),
                None => {
                    self.mode = IterMode::Done;
                    return None;
                }
            },
            IterMode::Workers {
                pool,
                pending,
                dispatched,
                received,
                capacity,
            } => {
                let num_workers = pool.num_workers();
                let mut send_error = None;

                // Keep every worker's queue topped up.
                while *pending < *capacity {
                    let Some(task) = self.tasks.next() else {
                        break;
                    };
                    let worker = *dispatched % num_workers;
                    if let Err(e) = pool.send(worker, task) {
                        send_error = Some(e.context(format!(
                            "Failed to send batch {} to worker {}",
                            *dispatched, worker
                        )));
                        break;
                    }
                    *dispatched += 1;
                    *pending += 1;
                }

                if let Some(e) = send_error {
                    Err(e)
                } else if *pending == 0 {
                    self.mode = IterMode::Done;
                    return None;
                } else {
                    let worker = *received % num_workers;
                    let result = pool
                        .recv(worker, self.timeout)
                        .with_context(|| {
                            format!(
                                "Failed to receive batch {} (pending: {}, possible deadlock or slow transform)",
                                *received, *pending
                            )
                        })
                        .and_then(|batch| batch);
                    *pending -= 1;
                    *received += 1;
                    result
                }
            }
        };

        if result.is_err() {
            self.mode = IterMode::Done;
        }
        Some(result)
    }
}

/// Fetches, transforms and collates the samples of one batch.
pub(crate) fn build_batch<D, T>(
    dataset: &D,
    transform: &T,
    collator: &StackCollator,
    seed: u64,
    task: BatchTask,
) -> Result<MiniBatch>
where
    D: Dataset + ?Sized,
    T: Transform<D::Item, Sample> + ?Sized,
{
    init_batch_rng(seed, task.epoch, task.batch);
    let batch = task
        .indices
        .iter()
        .map(|&index| {
            let item = dataset.get(index)?;
            transform
                .apply(item)
                .with_context(|| format!("Failed to transform sample {}", index))
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to build batch {} of epoch {}", task.batch, task.epoch))
        .and_then(|samples| collator.collate(&samples));
    clear_batch_rng();
    batch
}
