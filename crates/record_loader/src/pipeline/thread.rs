//! Per-thread worker identity and randomness.
//!
//! Random transforms draw from a thread-local RNG that is reseeded from
//! `(seed, epoch, batch)` before each batch is built. The draws for a batch
//! therefore do not depend on which worker builds it or how many workers
//! there are. The RNG is dropped again once the batch is built.

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};
use std::cell::{Cell, RefCell};

thread_local! {
    /// Index of the pipeline worker running on this thread (0 on the caller's thread).
    pub static WORKER_ID: Cell<usize> = const { Cell::new(0) };

    static WORKER_RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

/// Seed formula: `base_seed + (epoch << 32) + batch_index`.
pub fn init_batch_rng(base_seed: u64, epoch: usize, batch_index: usize) {
    let seed = base_seed
        .wrapping_add((epoch as u64) << 32)
        .wrapping_add(batch_index as u64);
    WORKER_RNG.with(|rng| *rng.borrow_mut() = Some(StdRng::seed_from_u64(seed)));
}

/// Drops the batch RNG so later draws on this thread use the thread RNG.
pub fn clear_batch_rng() {
    WORKER_RNG.with(|rng| *rng.borrow_mut() = None);
}

pub(crate) fn batch_rng_active() -> bool {
    WORKER_RNG.with(|rng| rng.borrow().is_some())
}

/// Bernoulli draw from the batch RNG, falling back to the thread RNG
/// outside a pipeline.
pub fn worker_gen_bool(p: f64) -> bool {
    WORKER_RNG.with(|rng| match rng.borrow_mut().as_mut() {
        Some(rng) => rng.random_bool(p),
        None => rand::rng().random_bool(p),
    })
}

pub fn current_worker_id() -> usize {
    WORKER_ID.with(Cell::get)
}
