//! Resolution of the distributed shard from the process environment.
//!
//! `RANK_SIZE` and `RANK_ID` are read once by [`RankConfig::from_env`];
//! [`resolve_rank`] then works on the captured values only, so it can be
//! exercised without touching the process environment.

use crate::pipeline::ShardInfo;
use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const RANK_SIZE_VAR: &str = "RANK_SIZE";
pub const RANK_ID_VAR: &str = "RANK_ID";

/// Raw, unparsed rank variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankConfig {
    pub rank_size: Option<String>,
    pub rank_id: Option<String>,
}

impl RankConfig {
    pub fn from_env() -> Self {
        Self {
            rank_size: std::env::var(RANK_SIZE_VAR).ok(),
            rank_id: std::env::var(RANK_ID_VAR).ok(),
        }
    }

    pub fn new(rank_size: impl Into<String>, rank_id: impl Into<String>) -> Self {
        Self {
            rank_size: Some(rank_size.into()),
            rank_id: Some(rank_id.into()),
        }
    }
}

/// Turns captured rank variables into a shard assignment.
///
/// - `RANK_SIZE` unset: one shard.
/// - `RANK_SIZE <= 1`: one shard, `RANK_ID` ignored.
/// - `RANK_SIZE > 1`: `RANK_ID` is required.
///
/// Malformed integers are errors. `RANK_ID` is not checked against
/// `RANK_SIZE` here.
pub fn resolve_rank(config: &RankConfig) -> Result<ShardInfo> {
    let rank_size = match config.rank_size.as_deref() {
        Some(raw) => parse_var::<i64>(RANK_SIZE_VAR, raw)?,
        None => 1,
    };

    if rank_size <= 1 {
        debug!(rank_size, "Running unsharded");
        return Ok(ShardInfo::single());
    }

    let raw_id = config
        .rank_id
        .as_deref()
        .ok_or_else(|| anyhow!("{} is {} but {} is not set", RANK_SIZE_VAR, rank_size, RANK_ID_VAR))?;
    let rank_id = parse_var::<usize>(RANK_ID_VAR, raw_id)?;

    debug!(rank_size, rank_id, "Resolved distributed rank");
    Ok(ShardInfo::new(rank_size as usize, rank_id))
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Invalid {} value {:?}", name, raw))
}

/// Accelerator the pipeline feeds.
///
/// Both targets resolve their shard from [`RankConfig`]. On `Gpu` the
/// collective runtime is owned by the training process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceTarget {
    #[default]
    Ascend,
    Gpu,
}

impl DeviceTarget {
    /// Resolves the shard for this target.
    pub fn shard_info(self, config: &RankConfig) -> Result<ShardInfo> {
        if self == DeviceTarget::Gpu {
            debug!("GPU target: collective initialization is left to the training runtime");
        }
        resolve_rank(config)
    }
}

impl FromStr for DeviceTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ascend" => Ok(DeviceTarget::Ascend),
            "gpu" => Ok(DeviceTarget::Gpu),
            _ => bail!("Unknown device target {:?} (expected \"Ascend\" or \"GPU\")", s),
        }
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceTarget::Ascend => f.write_str("Ascend"),
            DeviceTarget::Gpu => f.write_str("GPU"),
        }
    }
}
