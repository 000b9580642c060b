//! Worker threads that turn batch index lists into collated batches.
//!
//! Every worker owns a bounded task channel and a bounded output channel.
//! The consumer hands batch `n` to worker `n % num_workers` and collects
//! batch `n` from the same worker, so batches come back in dispatch order.
//!
//! ```text
//!              ┌─ task[0] ─▶ worker 0 ─ out[0] ─┐
//!  consumer ───┼─ task[1] ─▶ worker 1 ─ out[1] ─┼──▶ consumer (round-robin recv)
//!              └─ task[2] ─▶ worker 2 ─ out[2] ─┘
//! ```

use anyhow::{anyhow, ensure, Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::thread::WORKER_ID;

/// Fixed-size thread pool with per-worker channels.
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_txs: Vec<Sender<Task>>,
    output_rxs: Vec<Receiver<Output>>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns `num_workers` threads running `worker_fn`.
    ///
    /// `buffer_size` bounds both the task and output queue of each worker.
    pub(crate) fn new<F>(num_workers: usize, buffer_size: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        ensure!(
            num_workers > 0,
            "Cannot create WorkerPool with 0 workers; use inline mode instead"
        );
        ensure!(
            buffer_size > 0,
            "Cannot create WorkerPool with buffer_size 0"
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);
        let mut task_txs = Vec::with_capacity(num_workers);
        let mut output_rxs = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (task_tx, task_rx) = bounded(buffer_size);
            let (output_tx, output_rx) = bounded(buffer_size);
            let shutdown = shutdown.clone();
            let worker_fn = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("pipeline-worker-{}", worker_id))
                .spawn(move || {
                    WORKER_ID.with(|id| id.set(worker_id));
                    debug!(worker_id, "Pipeline worker started");
                    worker_fn(task_rx, output_tx, shutdown);
                    debug!(worker_id, "Pipeline worker stopped");
                })
                .with_context(|| format!("Failed to spawn worker thread {}", worker_id))?;

            workers.push(handle);
            task_txs.push(task_tx);
            output_rxs.push(output_rx);
        }

        Ok(Self {
            workers,
            task_txs,
            output_rxs,
            shutdown,
        })
    }

    pub(crate) fn num_workers(&self) -> usize {
        self.task_txs.len()
    }

    pub(crate) fn send(&self, worker: usize, task: Task) -> Result<()> {
        self.task_txs
            .get(worker)
            .ok_or_else(|| anyhow!("No worker {}", worker))?
            .send(task)
            .map_err(|_| anyhow!("Worker {} has exited", worker))
    }

    pub(crate) fn recv(&self, worker: usize, timeout: Duration) -> Result<Output> {
        let rx = self
            .output_rxs
            .get(worker)
            .ok_or_else(|| anyhow!("No worker {}", worker))?;
        match rx.recv_timeout(timeout) {
            Ok(output) => Ok(output),
            Err(RecvTimeoutError::Timeout) => Err(anyhow!(
                "Timed out after {:?} waiting for worker {}",
                timeout,
                worker
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("Worker {} exited before returning a batch", worker))
            }
        }
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // Closing both ends unblocks workers waiting to receive or to send.
        self.task_txs.clear();
        self.output_rxs.clear();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Standard worker loop: poll for tasks until shutdown or disconnection,
/// forwarding each processed task to the output channel.
pub(crate) fn run_worker<Task, Output>(
    task_rx: Receiver<Task>,
    output_tx: Sender<Output>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
    mut process: impl FnMut(Task) -> Output,
) {
    while !shutdown.load(Ordering::Relaxed) {
        match task_rx.recv_timeout(poll_interval) {
            Ok(task) => {
                if output_tx.send(process(task)).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
