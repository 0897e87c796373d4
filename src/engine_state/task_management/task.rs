//! # Task Trait
//!
//! A `Task` is a unit of work executed once on a worker thread. Tasks own everything they
//! need (typically shared handles into the terrain) and report their outcome by writing
//! into that shared state, e.g. by appending a chunk key to the next stage's queue.
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be moved onto a worker
//! - A task runs outside every queue lock, so it may enqueue further tasks

/// A unit of work that can be executed on a worker thread.
pub trait Task: Send {
    /// Performs the work. Consumes the task; it runs exactly once.
    fn process(self: Box<Self>);

    /// Short description used when a task panics.
    fn name(&self) -> &str {
        "task"
    }
}

/// Adapts a closure into a [`Task`].
pub struct ClosureTask<F> {
    name: &'static str,
    job: F,
}

impl<F> ClosureTask<F>
where
    F: FnOnce() + Send + 'static,
{
    /// Wraps `job` under `name`.
    pub fn new(name: &'static str, job: F) -> Self {
        Self { name, job }
    }
}

impl<F> Task for ClosureTask<F>
where
    F: FnOnce() + Send + 'static,
{
    fn process(self: Box<Self>) {
        (self.job)()
    }

    fn name(&self) -> &str {
        self.name
    }
}
