use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::panic::resume_unwind;

use thiserror::Error;

use crate::utils::panic_message;

/// Boxed error returned by fallible producer routines
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Payload of a panic caught on the worker thread
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Result type of the consumer-facing operations
pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// How a consumer-facing operation did not produce a value
/// A session ends in exactly one of Exhausted, Cancelled or ProducerFailed
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// `next` was called although no further value is available
    #[error("generator is exhausted")]
    Exhausted,

    /// The session was cancelled before the producer finished
    #[error("generator session was cancelled")]
    Cancelled,

    /// The producer routine failed; reported once, the session is exhausted afterwards
    #[error("producer failed: {0}")]
    ProducerFailed(ProducerFailure),

    /// The execution context refused to run the worker
    #[error("failed to submit generator worker: {0}")]
    Submit(#[source] io::Error),
}

impl GeneratorError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, GeneratorError::Exhausted)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GeneratorError::Cancelled)
    }
}

/// Failure of a producer routine, captured on the worker and handed to the consumer
pub enum ProducerFailure {
    Panicked(PanicPayload),
    Errored(BoxError),
}

impl ProducerFailure {
    /// Re-raises the failure on the calling thread
    /// A panic resumes with its original payload, a returned error panics with its message
    pub fn into_panic(self) -> ! {
        match self {
            ProducerFailure::Panicked(payload) => resume_unwind(payload),
            ProducerFailure::Errored(err) => panic!("producer failed: {}", err),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ProducerFailure::Panicked(payload) => panic_message(&**payload).to_owned(),
            ProducerFailure::Errored(err) => err.to_string(),
        }
    }
}

impl fmt::Display for ProducerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerFailure::Panicked(payload) => write!(f, "panicked: {}", panic_message(&**payload)),
            ProducerFailure::Errored(err) => write!(f, "{}", err),
        }
    }
}

impl fmt::Debug for ProducerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerFailure::Panicked(payload) => f.debug_tuple("Panicked").field(&panic_message(&**payload)).finish(),
            ProducerFailure::Errored(err) => f.debug_tuple("Errored").field(err).finish(),
        }
    }
}

/// Outcome of a channel operation that did not pair with its peer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel operation was cancelled")]
    Cancelled,
    #[error("peer released its end of the channel")]
    Disconnected,
}
