use std::iter::FusedIterator;
use std::panic::resume_unwind;
use std::sync::Arc;

use log::{debug, trace};

use crate::error::{BoxError, ChannelError, GeneratorError, GeneratorResult};
use crate::executor::{Executor, ThreadExecutor};
use crate::transfer::{rendezvous, CancelToken, Message, RendezvousReceiver, RendezvousSender};
use crate::worker::{WorkerLifecycle, WorkerState};

pub(crate) type Routine<T> = Arc<dyn Fn(&mut Yielder<T>) -> Result<(), BoxError> + Send + Sync + 'static>;

/// Factory binding a producer routine to an execution context
/// Nothing runs until `iter` is called, and every call starts an independent session with its own channel and worker
pub struct Generator<T> {
    routine: Routine<T>,
    executor: Arc<dyn Executor>,
}

impl<T> Clone for Generator<T> {
    fn clone(&self) -> Self {
        Self {
            routine: Arc::clone(&self.routine),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<T: Send + 'static> Generator<T> {
    /// Generator running its sessions on a default [`ThreadExecutor`]
    pub fn on<R>(routine: R) -> Self
    where
        R: Fn(&mut Yielder<T>) + Send + Sync + 'static,
    {
        Self::on_with(routine, ThreadExecutor::default())
    }

    pub fn on_with<R, X>(routine: R, executor: X) -> Self
    where
        R: Fn(&mut Yielder<T>) + Send + Sync + 'static,
        X: Executor + 'static,
    {
        let routine: Routine<T> = Arc::new(move |y: &mut Yielder<T>| {
            routine(y);
            Ok(())
        });
        Self { routine, executor: Arc::new(executor) }
    }

    /// Generator for a fallible routine; a returned error ends the session like a panic does
    pub fn try_on<R, E>(routine: R) -> Self
    where
        R: Fn(&mut Yielder<T>) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::try_on_with(routine, ThreadExecutor::default())
    }

    pub fn try_on_with<R, E, X>(routine: R, executor: X) -> Self
    where
        R: Fn(&mut Yielder<T>) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
        X: Executor + 'static,
    {
        let routine: Routine<T> = Arc::new(move |y: &mut Yielder<T>| routine(y).map_err(Into::into));
        Self { routine, executor: Arc::new(executor) }
    }

    /// Opens a new session; the worker is only submitted on the first demand for a value
    pub fn iter(&self) -> GeneratorIterator<T> {
        let cancel = CancelToken::new();
        let (sender, receiver) = rendezvous(cancel.clone());
        let worker = WorkerLifecycle::new(Arc::clone(&self.routine), sender, Arc::clone(&self.executor), cancel);
        GeneratorIterator::new(receiver, worker)
    }

    /// Runs one session to its end and collects every value
    /// Never returns for an infinite producer
    pub fn to_vec(&self) -> GeneratorResult<Vec<T>> {
        let mut values = Vec::new();
        let mut iter = self.iter();
        while iter.has_next()? {
            values.push(iter.try_next()?);
        }
        Ok(values)
    }
}

impl<'a, T: Send + 'static> IntoIterator for &'a Generator<T> {
    type Item = T;
    type IntoIter = GeneratorIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Ended,
    Cancelled,
}

/// Unwind payload that carries a stop out of the routine
/// It never leaves the worker thread: the worker body catches it and turns it into the end of the session
pub(crate) struct StopUnwind;

/// Producer side handle, lent to the routine for one worker invocation
pub struct Yielder<T> {
    sender: RendezvousSender<T>,
    stop: Option<StopReason>,
}

impl<T> Yielder<T> {
    pub(crate) fn new(sender: RendezvousSender<T>) -> Self {
        Self { sender, stop: None }
    }

    /// Hands `value` to the consumer, blocking until it is taken
    /// Once the session is stopped (by `end` or because the consumer released the iterator) the call
    /// does not return: the routine is unwound on the worker thread and the value never reaches the channel
    pub fn value(&mut self, value: T) {
        if let Some(reason) = self.stop {
            self.unwind(reason);
        }
        if let Err(err) = self.sender.send(Message::Value(value)) {
            debug!("yielder stopped: {}", err);
            self.unwind(StopReason::Cancelled);
        }
    }

    /// Yields every item of `values` in order
    pub fn yield_all<I: IntoIterator<Item = T>>(&mut self, values: I) {
        for value in values {
            self.value(value);
        }
    }

    /// Ends the sequence right away; the routine does not continue past this call
    pub fn end(&mut self) -> ! {
        let reason = *self.stop.get_or_insert(StopReason::Ended);
        self.unwind(reason)
    }

    /// Whether the session is stopped, for routines that run long stretches without yielding
    pub fn is_stopped(&self) -> bool {
        self.stop.is_some() || self.sender.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.stop == Some(StopReason::Cancelled) || self.sender.is_cancelled()
    }

    pub(crate) fn into_sender(self) -> RendezvousSender<T> {
        self.sender
    }

    fn unwind(&mut self, reason: StopReason) -> ! {
        self.stop = Some(reason);
        // resume_unwind skips the panic hook, a stop is not reported as a panic
        resume_unwind(Box::new(StopUnwind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    NotStarted,
    Running,
    Exhausted,
}

/// Consumer side of one generator session
/// Holds at most one received value ahead of the caller
/// Release it with `close` (or by dropping it) when abandoning the sequence before its end, which unblocks and stops the worker
pub struct GeneratorIterator<T> {
    receiver: Option<RendezvousReceiver<T>>,
    worker: WorkerLifecycle<T>,
    cached: Option<T>,
    state: IterState,
}

impl<T: Send + 'static> GeneratorIterator<T> {
    fn new(receiver: RendezvousReceiver<T>, worker: WorkerLifecycle<T>) -> Self {
        Self {
            receiver: Some(receiver),
            worker,
            cached: None,
            state: IterState::NotStarted,
        }
    }

    /// Whether another value is available, blocking until the worker provides one or ends
    /// Calling it repeatedly without `try_next` neither skips nor re-blocks
    /// A cancelled session reports Cancelled; a producer failure is reported once as ProducerFailed and the session is exhausted afterwards
    pub fn has_next(&mut self) -> GeneratorResult<bool> {
        if self.cached.is_some() {
            return Ok(true);
        }
        match self.state {
            IterState::Exhausted => return self.terminal_outcome(),
            IterState::NotStarted => {
                self.state = IterState::Running;
                if let Err(err) = self.worker.start() {
                    self.finish(WorkerState::Failed);
                    return Err(err);
                }
            }
            IterState::Running => {}
        }

        let received = match &self.receiver {
            Some(receiver) => receiver.receive(),
            None => Err(ChannelError::Cancelled),
        };
        match received {
            Ok(Message::Value(value)) => {
                trace!("generator value received");
                self.cached = Some(value);
                Ok(true)
            }
            Ok(Message::End) => {
                self.finish(WorkerState::Finished);
                Ok(false)
            }
            Ok(Message::Failed(failure)) => {
                self.finish(WorkerState::Failed);
                Err(GeneratorError::ProducerFailed(failure))
            }
            Err(err) => {
                debug!("generator session interrupted: {}", err);
                self.close();
                Err(GeneratorError::Cancelled)
            }
        }
    }

    /// Takes the next value, failing with Exhausted when there is none
    pub fn try_next(&mut self) -> GeneratorResult<T> {
        if !self.has_next()? {
            return Err(GeneratorError::Exhausted);
        }
        self.cached.take().ok_or(GeneratorError::Exhausted)
    }

    fn terminal_outcome(&self) -> GeneratorResult<bool> {
        match self.worker.state() {
            WorkerState::Cancelled => Err(GeneratorError::Cancelled),
            _ => Ok(false),
        }
    }

    fn finish(&mut self, state: WorkerState) {
        self.worker.complete(state);
        self.receiver = None;
        self.state = IterState::Exhausted;
    }
}

impl<T> GeneratorIterator<T> {
    /// Releases the session: cancels the worker and drops the channel
    /// Values not taken yet are discarded; a session that already ended is left as it is
    pub fn close(&mut self) {
        self.worker.cancel();
        self.receiver = None;
        self.cached = None;
        self.state = IterState::Exhausted;
    }

    /// Token that cancels this session from any thread, unblocking both sides of the channel
    pub fn cancel_handle(&self) -> CancelToken {
        self.worker.cancel_token().clone()
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    pub fn worker(&self) -> &WorkerLifecycle<T> {
        &self.worker
    }
}

impl<T> Drop for GeneratorIterator<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Send + 'static> Iterator for GeneratorIterator<T> {
    type Item = T;

    /// Yields values until the session is exhausted or cancelled
    /// Panics instead of hiding a session that could not complete, `try_next` reports the same cases as errors:
    /// - a producer panic resumes with its original payload, a returned producer error panics with its message
    /// - an execution context that refused the worker panics with the submit error, `worker().state()` is then Failed
    fn next(&mut self) -> Option<T> {
        match self.try_next() {
            Ok(value) => Some(value),
            Err(GeneratorError::Exhausted) | Err(GeneratorError::Cancelled) => None,
            Err(GeneratorError::ProducerFailed(failure)) => failure.into_panic(),
            Err(err @ GeneratorError::Submit(_)) => panic!("{}", err),
        }
    }
}

impl<T: Send + 'static> FusedIterator for GeneratorIterator<T> {}
