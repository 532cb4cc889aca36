//! Small Tokio-based building blocks: a bounded-concurrency execution pool
//! with per-task success and error hooks, a rotatable ring buffer, and
//! resettable timers.

mod error;
mod pool;
mod ring;
mod task;
mod timer;

pub use error::{PoolError, RingBufferError};
pub use pool::ExecutionPool;
pub use ring::RingBuffer;
pub use task::{ExecutionTask, TaskFailure, TaskFuture};
pub use timer::{RepeatableTimer, ResettableTimer};
