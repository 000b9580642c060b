//! `create_dataset` reads its shard from the environment. Kept in its own
//! test binary because it mutates process-wide variables.

mod common;
use common::{temp_store, StoreLayout};

use anyhow::Result;
use record_loader::{create_dataset, DeviceTarget, ShardInfo};

#[test]
fn shard_comes_from_rank_variables() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(8).size(112, 112))?;

    std::env::remove_var("RANK_SIZE");
    std::env::remove_var("RANK_ID");
    let pipeline = create_dataset(store.path(), true, 1, 4, DeviceTarget::Ascend)?;
    assert_eq!(pipeline.shard(), ShardInfo::new(1, 0));
    assert_eq!(pipeline.config().num_workers, 8);
    assert_eq!(pipeline.iter()?.count(), 2);

    std::env::set_var("RANK_SIZE", "2");
    std::env::set_var("RANK_ID", "1");
    let pipeline = create_dataset(store.path(), false, 2, 2, DeviceTarget::Gpu)?;
    assert_eq!(pipeline.shard(), ShardInfo::new(2, 1));
    assert_eq!(pipeline.batches_per_epoch(), 2);
    assert_eq!(pipeline.iter()?.count(), 4);

    std::env::set_var("RANK_ID", "not-a-number");
    assert!(create_dataset(store.path(), true, 1, 2, DeviceTarget::Ascend).is_err());

    std::env::remove_var("RANK_SIZE");
    std::env::remove_var("RANK_ID");
    Ok(())
}
