use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{GeneratorError, GeneratorResult, ProducerFailure};
use crate::executor::{Executor, TaskHandle};
use crate::generators::{Routine, StopUnwind, Yielder};
use crate::transfer::{CancelToken, Message, RendezvousSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Finished,
    Cancelled,
    Failed,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        match self {
            WorkerState::Created | WorkerState::Running => false,
            WorkerState::Finished | WorkerState::Cancelled | WorkerState::Failed => true,
        }
    }
}

/// Owns the background task of one iterator session
/// The routine and the sending end of the channel are parked here until the first demand starts the worker
pub struct WorkerLifecycle<T> {
    state: WorkerState,
    pending: Option<(Routine<T>, RendezvousSender<T>)>,
    executor: Arc<dyn Executor>,
    token: CancelToken,
    handle: Option<Box<dyn TaskHandle>>,
}

impl<T: Send + 'static> WorkerLifecycle<T> {
    pub(crate) fn new(routine: Routine<T>, sender: RendezvousSender<T>, executor: Arc<dyn Executor>, token: CancelToken) -> Self {
        Self {
            state: WorkerState::Created,
            pending: Some((routine, sender)),
            executor,
            token,
            handle: None,
        }
    }

    /// Submits the worker to the execution context; calling it again is a no-op
    pub fn start(&mut self) -> GeneratorResult<()> {
        let (routine, sender) = match (self.state, self.pending.take()) {
            (WorkerState::Created, Some(pending)) => pending,
            _ => return Ok(()),
        };
        match self.executor.submit(Box::new(move || run_producer(routine, sender))) {
            Ok(handle) => {
                debug!("generator worker started");
                self.handle = Some(handle);
                self.state = WorkerState::Running;
                Ok(())
            }
            Err(err) => {
                warn!("failed to submit generator worker: {}", err);
                self.state = WorkerState::Failed;
                Err(GeneratorError::Submit(err))
            }
        }
    }
}

impl<T> WorkerLifecycle<T> {
    /// Stops the session: unblocks the worker if it is parked on the channel and cancels its task
    /// Has no effect once the lifecycle is terminal
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.token.cancel();
        if let Some(handle) = &self.handle {
            handle.cancel(true);
        }
        self.pending = None;
        self.state = WorkerState::Cancelled;
        debug!("generator worker cancelled");
    }

    /// Records the terminal state the consumer observed on the channel
    pub(crate) fn complete(&mut self, state: WorkerState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the background task has returned
    /// A session cancelled before its worker was submitted never had a task and counts as done
    pub fn is_done(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_done(),
            None => self.state.is_terminal(),
        }
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.token
    }
}

/// Body of the worker task: runs the routine once and posts the terminal message on every exit path
/// A stop unwound out of the routine by the yielder ends the session like a return does
/// Nothing is posted if the session was cancelled, the consumer is gone
fn run_producer<T>(routine: Routine<T>, sender: RendezvousSender<T>) {
    let mut yielder = Yielder::new(sender);
    let result = catch_unwind(AssertUnwindSafe(|| routine(&mut yielder)));
    let terminal = match result {
        Ok(Ok(())) => Message::End,
        Ok(Err(err)) => Message::Failed(ProducerFailure::Errored(err)),
        Err(payload) if (*payload).is::<StopUnwind>() => Message::End,
        Err(payload) => Message::Failed(ProducerFailure::Panicked(payload)),
    };
    if let Message::Failed(failure) = &terminal {
        warn!("generator producer failed: {}", failure);
    }

    if yielder.is_cancelled() {
        debug!("generator worker exits after cancellation");
        return;
    }
    match yielder.into_sender().send(terminal) {
        Ok(()) => debug!("generator worker finished"),
        Err(err) => debug!("generator worker could not post its end: {}", err),
    }
}
