use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::trace;
use parking_lot::Mutex;

use crate::error::{ChannelError, ProducerFailure};

/// Unit of exchange between the worker and the consumer
/// Exactly one message is in flight at any time; a session ends with exactly one `End` or `Failed`
/// Since the end of the sequence has its own variant, every value of T (including `None` or `()`) can be transferred
pub enum Message<T> {
    Value(T),
    End,
    Failed(ProducerFailure),
}

impl<T> Message<T> {
    /// Queries whether this message carries a value rather than terminating the sequence
    pub fn is_value(&self) -> bool {
        match self {
            Message::Value(_) => true,
            Message::End | Message::Failed(_) => false,
        }
    }

    /// Moves the carried value out, returns None for terminal messages
    pub fn into_value(self) -> Option<T> {
        match self {
            Message::Value(v) => Some(v),
            _ => None,
        }
    }
}

struct CancelState {
    cancelled: AtomicBool,
    // dropping the sender disconnects `signal`, which wakes every select waiting on it
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Shared stop request of one generator session
/// Cloning yields another reference to the same request, cancelling is idempotent and irreversible
#[derive(Clone)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self(Arc::new(CancelState {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
        }))
    }

    /// Marks the session as cancelled and unblocks every channel operation parked on it
    /// Returns false if the token was cancelled before
    pub fn cancel(&self) -> bool {
        let first = !self.0.cancelled.swap(true, Ordering::AcqRel);
        self.0.trigger.lock().take();
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates both ends of a single slot rendezvous channel bound to the given cancel token
/// The underlying channel has capacity zero: a send completes only when a receive takes the message
pub fn rendezvous<T>(cancel: CancelToken) -> (RendezvousSender<T>, RendezvousReceiver<T>) {
    let (tx, rx) = bounded(0);
    (
        RendezvousSender { tx, cancel: cancel.clone() },
        RendezvousReceiver { rx, cancel },
    )
}

/// Producer end of the rendezvous channel, owned by the worker
pub struct RendezvousSender<T> {
    tx: Sender<Message<T>>,
    cancel: CancelToken,
}

impl<T> RendezvousSender<T> {
    /// Hands [msg] to the receiver, blocking until it is taken
    /// Fails with Cancelled if the token is or becomes cancelled and with Disconnected if the receiver was released
    pub fn send(&self, msg: Message<T>) -> Result<(), ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        select! {
            send(self.tx, msg) -> res => {
                trace!("rendezvous: message handed over");
                res.map_err(|_| ChannelError::Disconnected)
            },
            recv(self.cancel.0.signal) -> _ => Err(ChannelError::Cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumer end of the rendezvous channel, owned by the iterator
pub struct RendezvousReceiver<T> {
    rx: Receiver<Message<T>>,
    cancel: CancelToken,
}

impl<T> RendezvousReceiver<T> {
    /// Blocks until the sender provides the next message
    /// Fails with Cancelled if the token is or becomes cancelled and with Disconnected if the sender went away without a terminal message
    pub fn receive(&self) -> Result<Message<T>, ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Cancelled);
        }
        select! {
            recv(self.rx) -> msg => msg.map_err(|_| ChannelError::Disconnected),
            recv(self.cancel.0.signal) -> _ => Err(ChannelError::Cancelled),
        }
    }
}
