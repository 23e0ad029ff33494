use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use log::debug;

/// Unit of work submitted to an [`Executor`]
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run a task in the background
pub trait Executor: Send + Sync {
    /// Schedules [task] and returns a handle to it, or the reason it could not be scheduled
    fn submit(&self, task: Task) -> io::Result<Box<dyn TaskHandle>>;
}

/// Handle to a submitted task
pub trait TaskHandle: Send {
    /// Requests cancellation, a task that has not started yet must not run at all
    /// Returns false if the task had already completed
    fn cancel(&self, interrupt_if_running: bool) -> bool;

    /// Whether the task has returned (or will never run because it was cancelled first)
    fn is_done(&self) -> bool;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn submit(&self, task: Task) -> io::Result<Box<dyn TaskHandle>> {
        (**self).submit(task)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn submit(&self, task: Task) -> io::Result<Box<dyn TaskHandle>> {
        (**self).submit(task)
    }
}

const DEFAULT_NAME_PREFIX: &str = "threadgen-worker";

/// Runs every task on a dedicated OS thread
#[derive(Clone, Debug)]
pub struct ThreadExecutor {
    name_prefix: String,
    stack_size: Option<usize>,
    next_id: Arc<AtomicUsize>,
    spawned: Arc<AtomicUsize>,
}

impl ThreadExecutor {
    pub fn new() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_owned(),
            stack_size: None,
            next_id: Arc::new(AtomicUsize::new(0)),
            spawned: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Worker threads are named `<prefix>-<n>`
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    /// Number of threads spawned by this executor and its clones, failed spawns excluded
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct ThreadTaskState {
    cancelled: AtomicBool,
    done: AtomicBool,
}

// marks the task done on every exit path of the thread body, unwinding included
struct DoneGuard(Arc<ThreadTaskState>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.done.store(true, Ordering::Release);
    }
}

impl Executor for ThreadExecutor {
    fn submit(&self, task: Task) -> io::Result<Box<dyn TaskHandle>> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}", self.name_prefix, n);
        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let state = Arc::new(ThreadTaskState::default());
        let thread_state = Arc::clone(&state);
        builder.spawn(move || {
            let guard = DoneGuard(thread_state);
            if guard.0.cancelled.load(Ordering::Acquire) {
                debug!("task cancelled before it started");
                return;
            }
            task();
        })?;
        self.spawned.fetch_add(1, Ordering::Relaxed);
        debug!("spawned worker thread {}", name);
        Ok(Box::new(ThreadHandle { state }))
    }
}

/// Handle to a task running on a [`ThreadExecutor`] thread
/// A running OS thread cannot be interrupted, a running generator worker is stopped through its session's cancel token instead
pub struct ThreadHandle {
    state: Arc<ThreadTaskState>,
}

impl TaskHandle for ThreadHandle {
    fn cancel(&self, _interrupt_if_running: bool) -> bool {
        if self.state.done.load(Ordering::Acquire) {
            return false;
        }
        self.state.cancelled.store(true, Ordering::Release);
        true
    }

    fn is_done(&self) -> bool {
        self.state.done.load(Ordering::Acquire)
    }
}
