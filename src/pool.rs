//! Worker pool.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log;

use crate::sort::SortError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a submitted task.
///
/// Resolves exactly once: either to the task's return value, or to
/// [`SortError::Canceled`] if the task was discarded before it could
/// produce one (pool shutdown with pending work, or a panic inside the
/// task).
pub struct TaskHandle<T> {
    result: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task resolves.
    pub fn join(self) -> Result<T, SortError> {
        self.result.recv().map_err(|_| SortError::Canceled)
    }
}

/// Fixed-size pool of long-lived worker threads fed from a shared queue.
///
/// Workers loop on the queue and execute submitted tasks in no particular
/// order. Dropping the pool closes the queue, lets the workers drain what
/// is still queued and joins every worker thread.
pub struct WorkerPool {
    queue: Option<Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts a pool of `workers` threads.
    pub fn new(workers: usize) -> Result<Self, SortError> {
        let (queue, jobs) = unbounded::<Job>();

        let workers = (0..workers.max(1))
            .map(|id| {
                let jobs: Receiver<Job> = jobs.clone();
                thread::Builder::new()
                    .name(format!("binsort-worker-{}", id))
                    .spawn(move || Self::worker_loop(&jobs))
                    .map_err(SortError::PoolBuild)
            })
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(WorkerPool {
            queue: Some(queue),
            workers,
        });
    }

    fn worker_loop(jobs: &Receiver<Job>) {
        while let Ok(job) = jobs.recv() {
            // a panicking task must not take the worker down with it;
            // its handle resolves to Canceled instead
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                log::error!("worker task panicked");
            }
        }
    }

    /// Submits a task for execution and returns its handle.
    ///
    /// Fails with [`SortError::PoolShutdown`] once [`WorkerPool::shutdown`]
    /// has been called.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, SortError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let queue = self.queue.as_ref().ok_or(SortError::PoolShutdown)?;

        let (resolve, result) = bounded(1);
        let job: Job = Box::new(move || {
            // the handle may already have been dropped by the caller
            let _ = resolve.send(task());
        });

        queue.send(job).map_err(|_| SortError::PoolShutdown)?;

        return Ok(TaskHandle { result });
    }

    /// Closes the queue. Queued work is drained, further submissions fail.
    pub fn shutdown(&mut self) {
        self.queue.take();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("worker thread panicked");
            }
        }
    }
}
