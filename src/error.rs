use thiserror::Error;

/// Errors that can occur when configuring an `ExecutionPool`.
///
/// Task-level failures never surface here; they are routed to each task's
/// error hook as a [`TaskFailure`](crate::TaskFailure).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
  #[error("Invalid pool configuration: concurrency must be at least 1 (got {0})")]
  InvalidConfiguration(usize),
}

/// Errors returned by [`RingBuffer`](crate::RingBuffer) operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferError {
  #[error("Ring buffer has no elements to rotate")]
  Empty,
}
