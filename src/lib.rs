pub mod error;
pub mod executor;
pub mod generators;
pub mod transfer;
mod utils;
pub mod worker;

pub use crate::error::{BoxError, ChannelError, GeneratorError, GeneratorResult, ProducerFailure};
pub use crate::executor::{Executor, Task, TaskHandle, ThreadExecutor};
pub use crate::generators::{Generator, GeneratorIterator, IterState, Yielder};
pub use crate::transfer::{CancelToken, Message};
pub use crate::worker::{WorkerLifecycle, WorkerState};
