//! Configuration for pipeline behaviour.
//!
//! ```ignore
//! let config = PipelineConfig::builder()
//!     .batch_size(64)
//!     .repeat_num(2)
//!     .num_workers(4)
//!     .seed(7)
//!     .build()?;
//! ```
//!
//! - `num_workers`: more workers raise throughput and memory use.
//! - `prefetch_factor`: batches queued per worker; bounds memory in flight.

use anyhow::{ensure, Result};
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 32;
pub const DEFAULT_REPEAT_NUM: usize = 1;
pub const DEFAULT_NUM_WORKERS: usize = 8;
pub const DEFAULT_PREFETCH_FACTOR: usize = 2;
/// Upper bound on `repeat_num`, keeping epoch arithmetic far from overflow.
pub const MAX_REPEAT_NUM: usize = 1 << 20;
/// Shuffle seed used by sharded pipelines when none is configured. Every
/// rank must shuffle with the same seed for the shards to stay disjoint.
pub const DEFAULT_SHARD_SEED: u64 = 5489;

/// Configuration for [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Samples per batch. A trailing partial batch is always dropped.
    pub batch_size: usize,
    /// Passes over the sample set per call to `iter()`.
    pub repeat_num: usize,
    /// Worker threads (0 = build batches on the calling thread).
    pub num_workers: usize,
    /// Reshuffle sample order every epoch.
    pub shuffle: bool,
    /// Seed for shuffling and random transforms.
    pub seed: Option<u64>,
    /// Batches queued per worker (must be > 0 when using workers).
    pub prefetch_factor: usize,
    /// Maximum wait for a batch from a worker before reporting an error.
    pub timeout: Duration,
    /// How often idle workers check for the shutdown signal.
    pub worker_poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            repeat_num: DEFAULT_REPEAT_NUM,
            num_workers: DEFAULT_NUM_WORKERS,
            shuffle: true,
            seed: None,
            prefetch_factor: DEFAULT_PREFETCH_FACTOR,
            timeout: Duration::from_secs(30),
            worker_poll_interval: Duration::from_millis(100),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be > 0");
        ensure!(self.repeat_num > 0, "repeat_num must be > 0");
        ensure!(
            self.repeat_num <= MAX_REPEAT_NUM,
            "repeat_num must be <= {} (got {})",
            MAX_REPEAT_NUM,
            self.repeat_num
        );
        ensure!(
            self.num_workers == 0 || self.prefetch_factor > 0,
            "prefetch_factor must be > 0 when num_workers > 0"
        );
        ensure!(!self.timeout.is_zero(), "timeout must be non-zero");
        ensure!(
            !self.worker_poll_interval.is_zero(),
            "worker_poll_interval must be non-zero"
        );
        Ok(())
    }
}

/// Builder for [`PipelineConfig`] with method chaining.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn repeat_num(mut self, repeat: usize) -> Self {
        self.config.repeat_num = repeat;
        self
    }

    pub fn num_workers(mut self, workers: usize) -> Self {
        self.config.num_workers = workers;
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    /// Fixes the seed for shuffling and random transforms.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn prefetch_factor(mut self, factor: usize) -> Self {
        self.config.prefetch_factor = factor;
        self
    }

    /// Too low cancels legitimately slow batches; too high delays
    /// detection of stuck workers.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn worker_poll_interval(mut self, interval: Duration) -> Self {
        self.config.worker_poll_interval = interval;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
