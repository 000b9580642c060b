use std::fmt;

/// Which slice of the sample set this process reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardInfo {
    pub num_shards: usize,
    pub shard_id: usize,
}

/// How the source sampler is chosen for a [`ShardInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardPlan {
    /// The whole sample set. Any shard id is ignored.
    Unsharded,
    Sharded { num_shards: usize, shard_id: usize },
}

impl ShardInfo {
    pub fn new(num_shards: usize, shard_id: usize) -> Self {
        Self {
            num_shards,
            shard_id,
        }
    }

    pub fn single() -> Self {
        Self::new(1, 0)
    }

    pub fn plan(&self) -> ShardPlan {
        if self.num_shards <= 1 {
            ShardPlan::Unsharded
        } else {
            ShardPlan::Sharded {
                num_shards: self.num_shards,
                shard_id: self.shard_id,
            }
        }
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self::single()
    }
}

impl fmt::Display for ShardInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shard_id, self.num_shards)
    }
}
