//! # Task Management System
//!
//! A fixed pool of worker threads consuming one shared FIFO of [`Task`]s.
//!
//! ## Architecture Overview
//!
//! - `TaskQueue`: owns the workers and the shared queue
//! - `Task`: a unit of work executed once on some worker
//! - `ClosureTask`: adapts a closure into a task
//!
//! All workers wait on one condition variable. [`TaskQueue::enqueue`] appends under the
//! queue lock and wakes a single worker; the worker pops the front job and runs it with
//! no lock held. Jobs start in submission order, but with more than one worker they may
//! finish in any order.
//!
//! ## Shutdown
//!
//! [`TaskQueue::shutdown`] raises the stop flag, wakes every worker and joins them.
//! Workers finish the jobs already queued before they exit, so every job accepted by
//! `enqueue` runs exactly once. Jobs submitted after shutdown began are rejected.
//!
//! ## Failure Isolation
//!
//! A panicking job is caught and logged; its worker moves on to the next job.
//!
//! ## Example Usage
//! ```rust
//! use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
//! use voxel_terrain::engine_state::task_management::TaskQueue;
//!
//! let queue = TaskQueue::new(4).unwrap();
//! let counter = Arc::new(AtomicUsize::new(0));
//! for _ in 0..10 {
//!     let counter = counter.clone();
//!     queue.execute("count", move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     }).unwrap();
//! }
//! queue.shutdown();
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! ```

pub mod task;

use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

pub use task::{ClosureTask, Task};

use super::error::{TerrainError, TerrainResult};

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Box<dyn Task>>,
    stopping: bool,
    in_flight: usize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    job_ready: Condvar,
    idle: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed-size worker pool over a shared FIFO of tasks.
pub struct TaskQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl TaskQueue {
    /// Starts `num_workers` worker threads.
    ///
    /// # Returns
    /// [`TerrainError::WorkerSpawn`] if a thread cannot be created; any workers already
    /// started are stopped and joined first.
    pub fn new(num_workers: usize) -> TerrainResult<Self> {
        let queue = TaskQueue {
            shared: Arc::new(Shared::default()),
            workers: Mutex::new(Vec::with_capacity(num_workers)),
            worker_count: num_workers,
        };

        for i in 0..num_workers {
            let shared = queue.shared.clone();
            let worker = thread::Builder::new()
                .name(format!("terrain-worker-{i}"))
                .spawn(move || worker_loop(&shared))
                .map_err(TerrainError::WorkerSpawn)?;
            queue.workers().push(worker);
        }

        log::info!(
            "Started {} task workers (available parallelism: {:?})",
            num_workers,
            thread::available_parallelism()
        );

        Ok(queue)
    }

    fn workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `task` to the queue and wakes one worker.
    ///
    /// # Returns
    /// [`TerrainError::TaskQueueStopped`] once shutdown has begun.
    pub fn enqueue(&self, task: Box<dyn Task>) -> TerrainResult<()> {
        {
            let mut state = self.shared.lock();
            if state.stopping {
                return Err(TerrainError::TaskQueueStopped);
            }
            state.jobs.push_back(task);
        }
        self.shared.job_ready.notify_one();
        Ok(())
    }

    /// Enqueues a closure.
    pub fn execute<F>(&self, name: &'static str, job: F) -> TerrainResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(ClosureTask::new(name, job)))
    }

    /// Blocks until the queue is empty and no job is running.
    ///
    /// Jobs that enqueue follow-up jobs keep the queue busy, so this also waits for the
    /// follow-ups.
    pub fn wait_idle(&self) {
        let mut state = self.shared.lock();
        while !state.jobs.is_empty() || state.in_flight > 0 {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Jobs waiting to be picked up.
    pub fn queued(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    /// Number of workers the queue was started with.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopping
    }

    /// Stops accepting jobs, lets the workers drain the queue and joins them.
    ///
    /// Calling this more than once is harmless.
    pub fn shutdown(&self) {
        self.shared.lock().stopping = true;
        self.shared.job_ready.notify_all();

        let workers: Vec<_> = self.workers().drain(..).collect();
        if workers.is_empty() {
            return;
        }

        let count = workers.len();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("A task worker exited abnormally");
            }
        }
        log::info!("Stopped {count} task workers");
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut state = shared.lock();
            loop {
                if let Some(task) = state.jobs.pop_front() {
                    state.in_flight += 1;
                    break task;
                }
                if state.stopping {
                    return;
                }
                state = shared
                    .job_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let name = task.name().to_owned();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.process())) {
            log::error!("Task '{}' panicked: {}", name, panic_message(&*payload));
        }

        let mut state = shared.lock();
        state.in_flight -= 1;
        if state.jobs.is_empty() && state.in_flight == 0 {
            shared.idle.notify_all();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn every_job_runs_exactly_once_before_shutdown_returns() {
        let queue = TaskQueue::new(4).unwrap();
        let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..500).map(|_| AtomicUsize::new(0)).collect());

        for i in 0..500 {
            let runs = runs.clone();
            queue
                .execute("count", move || {
                    if fastrand::u8(..) < 8 {
                        thread::sleep(Duration::from_micros(50));
                    }
                    runs[i].fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        queue.shutdown();

        assert!(runs.iter().all(|r| r.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn enqueue_after_shutdown_is_rejected() {
        let queue = TaskQueue::new(1).unwrap();
        queue.shutdown();
        queue.shutdown();
        assert!(queue.is_stopped());
        assert!(matches!(
            queue.execute("late", || {}),
            Err(TerrainError::TaskQueueStopped)
        ));
    }

    #[test]
    fn panicking_job_does_not_kill_its_worker() {
        let queue = TaskQueue::new(1).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        queue.execute("boom", || panic!("job failure")).unwrap();
        let after = ran.clone();
        queue
            .execute("after", move || {
                after.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        queue.wait_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_idle_covers_follow_up_jobs() {
        let queue = Arc::new(TaskQueue::new(2).unwrap());
        let done = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let inner_done = done.clone();
        queue
            .execute("parent", move || {
                let done = inner_done.clone();
                inner_queue
                    .execute("child", move || {
                        thread::sleep(Duration::from_millis(5));
                        done.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            })
            .unwrap();

        queue.wait_idle();
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(queue.queued(), 0);
        queue.shutdown();
    }
}
