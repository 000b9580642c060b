//! End-to-end tests: record store on disk -> batched tensors.
//!
//! Tests cover:
//! - Batch shapes and counts for training and evaluation
//! - Repeat count and restartable iteration
//! - Shard disjointness across ranks
//! - Identical batches for any worker count under a fixed seed

mod common;
use common::{temp_store, StoreLayout, LEFT_MARKER, RIGHT_MARKER};

use anyhow::Result;
use record_loader::{
    create_dataset_with, Dataset, FacePipeline, MiniBatch, Mode, PipelineConfig, ShardInfo,
};
use std::collections::HashSet;
use std::path::Path;
use tch::Kind;

fn config(batch_size: usize, workers: usize) -> Result<PipelineConfig> {
    PipelineConfig::builder()
        .batch_size(batch_size)
        .num_workers(workers)
        .seed(42)
        .build()
}

fn labels(batch: &MiniBatch) -> Result<Vec<i64>> {
    Ok(batch.labels()?.to_kind(Kind::Int64).try_into()?)
}

fn all_batches(pipeline: &FacePipeline) -> Result<Vec<MiniBatch>> {
    pipeline.iter()?.collect()
}

/// Whether a normalized tensor value came from `pixel`.
fn is_pixel(value: f64, pixel: u8) -> bool {
    (value - (pixel as f64 - 127.5) / 127.5).abs() < 1e-5
}

#[test]
fn ten_records_batch_two_yields_five_batches() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(10))?;
    let pipeline = create_dataset_with(
        store.path(),
        Mode::Train,
        ShardInfo::single(),
        config(2, 2)?,
    )?;
    assert_eq!(pipeline.dataset().len(), 10);
    assert_eq!(pipeline.batches_per_epoch(), 5);

    let batches = all_batches(&pipeline)?;
    assert_eq!(batches.len(), 5);

    let mut seen = Vec::new();
    for batch in &batches {
        let images = batch.images()?;
        assert_eq!(images.size(), vec![2, 3, 112, 112]);
        assert_eq!(images.kind(), Kind::Float);

        let batch_labels = batch.labels()?;
        assert_eq!(batch_labels.size(), vec![2]);
        assert_eq!(batch_labels.kind(), Kind::Int);
        seen.extend(labels(batch)?);
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..10).collect::<Vec<i64>>());
    Ok(())
}

#[test]
fn hundred_samples_batch_thirty_two_drops_remainder() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(100).size(32, 32))?;
    // Eval resizes to 256 and crops 112, so tiny stored images are fine.
    let pipeline = create_dataset_with(
        store.path(),
        Mode::Eval,
        ShardInfo::single(),
        config(32, 4)?,
    )?;
    let batches = all_batches(&pipeline)?;
    assert_eq!(batches.len(), 3);
    for batch in &batches {
        assert_eq!(batch.images()?.size(), vec![32, 3, 112, 112]);
    }
    Ok(())
}

#[test]
fn eval_resizes_and_crops_non_square_faces() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(4).size(300, 200))?;
    let pipeline = create_dataset_with(
        store.path(),
        Mode::Eval,
        ShardInfo::single(),
        config(4, 0)?,
    )?;
    let batches = all_batches(&pipeline)?;
    assert_eq!(batches.len(), 1);

    let images = batches[0].images()?;
    assert_eq!(images.size(), vec![4, 3, 112, 112]);
    assert!(images.max().double_value(&[]) <= 1.0);
    assert!(images.min().double_value(&[]) >= -1.0);
    Ok(())
}

#[test]
fn train_flips_some_faces_and_keeps_the_rest() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(40).size(112, 112))?;
    let pipeline = create_dataset_with(
        store.path(),
        Mode::Train,
        ShardInfo::single(),
        config(8, 2)?,
    )?;

    let (mut flipped, mut kept) = (0, 0);
    for batch in all_batches(&pipeline)? {
        let images = batch.images()?;
        for b in 0..images.size()[0] {
            let left = images.double_value(&[b, 0, 0, 0]);
            let right = images.double_value(&[b, 0, 0, 111]);
            if is_pixel(left, LEFT_MARKER) && is_pixel(right, RIGHT_MARKER) {
                kept += 1;
            } else if is_pixel(left, RIGHT_MARKER) && is_pixel(right, LEFT_MARKER) {
                flipped += 1;
            } else {
                panic!("unexpected edge values {} / {}", left, right);
            }
        }
    }
    assert_eq!(flipped + kept, 40);
    assert!(flipped > 0 && kept > 0, "flipped {} kept {}", flipped, kept);
    Ok(())
}

#[test]
fn repeat_runs_several_epochs_and_restarts() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(12).size(112, 112))?;
    let config = PipelineConfig::builder()
        .batch_size(4)
        .repeat_num(3)
        .num_workers(2)
        .seed(7)
        .build()?;
    let pipeline = create_dataset_with(store.path(), Mode::Train, ShardInfo::single(), config)?;
    assert_eq!(pipeline.len(), 9);

    let first: Vec<Vec<i64>> = all_batches(&pipeline)?
        .iter()
        .map(labels)
        .collect::<Result<_>>()?;
    assert_eq!(first.len(), 9);
    for epoch in first.chunks(3) {
        let mut ids: Vec<i64> = epoch.iter().flatten().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    let second = all_batches(&pipeline)?;
    assert_eq!(second.len(), 9);
    Ok(())
}

fn shard_labels(path: &Path, shard: ShardInfo) -> Result<HashSet<i64>> {
    let pipeline = create_dataset_with(path, Mode::Train, shard, config(2, 1)?)?;
    let mut seen = HashSet::new();
    for batch in all_batches(&pipeline)? {
        seen.extend(labels(&batch)?);
    }
    Ok(seen)
}

#[test]
fn shards_partition_the_sample_set() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(16).size(112, 112))?;

    let shards = (0..4)
        .map(|rank| shard_labels(store.path(), ShardInfo::new(4, rank)))
        .collect::<Result<Vec<_>>>()?;
    for (i, a) in shards.iter().enumerate() {
        assert_eq!(a.len(), 4);
        for b in &shards[i + 1..] {
            assert!(a.is_disjoint(b));
        }
    }

    // A single shard ignores the shard id.
    let whole = shard_labels(store.path(), ShardInfo::new(1, 3))?;
    assert_eq!(whole.len(), 16);

    assert!(create_dataset_with(
        store.path(),
        Mode::Train,
        ShardInfo::new(4, 4),
        config(2, 0)?
    )
    .is_err());
    Ok(())
}

#[test]
fn seeded_output_is_independent_of_worker_count() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(24).size(112, 112))?;
    let run = |workers| -> Result<Vec<MiniBatch>> {
        let pipeline =
            create_dataset_with(store.path(), Mode::Train, ShardInfo::single(), config(6, workers)?)?;
        all_batches(&pipeline)
    };

    let inline = run(0)?;
    for workers in [1, 3] {
        let threaded = run(workers)?;
        assert_eq!(threaded.len(), inline.len());
        for (a, b) in inline.iter().zip(&threaded) {
            assert!(a.labels()?.equal(b.labels()?));
            assert!(a.images()?.equal(b.images()?));
        }
    }
    Ok(())
}

#[test]
fn unflagged_store_uses_every_record() -> Result<()> {
    let store = temp_store(&StoreLayout::faces(9).size(112, 112).unflagged())?;
    let pipeline = create_dataset_with(
        store.path(),
        Mode::Train,
        ShardInfo::single(),
        config(3, 0)?,
    )?;
    assert_eq!(pipeline.batches_per_epoch(), 3);
    Ok(())
}
