use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// The boxed future type used for every task facet.
/// It must be `Send` and `'static`, and produce a value of type `T`.
pub type TaskFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type Producer<R, E> = Box<dyn FnOnce() -> TaskFuture<Result<R, E>> + Send + 'static>;
type SuccessHook<R, E> = Box<dyn FnOnce(R) -> TaskFuture<Result<(), E>> + Send + 'static>;
type ErrorHook<R, E> = Box<dyn FnOnce(TaskFailure<R, E>) -> TaskFuture<()> + Send + 'static>;

/// Why a task did not contribute a result to its run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure<R, E> {
  /// The producer returned an error.
  Producer(E),
  /// The producer succeeded but the success hook returned an error.
  /// Carries both the produced value and the hook's error.
  SuccessHook { result: R, error: E },
  /// The producer or the success hook panicked.
  Panicked,
}

impl<R, E> TaskFailure<R, E> {
  /// Short, stable name of the failure stage, used as a log field.
  pub fn kind(&self) -> &'static str {
    match self {
      TaskFailure::Producer(_) => "producer",
      TaskFailure::SuccessHook { .. } => "success_hook",
      TaskFailure::Panicked => "panicked",
    }
  }

  /// Returns the underlying error, if the failure carried one.
  pub fn error(&self) -> Option<&E> {
    match self {
      TaskFailure::Producer(error) | TaskFailure::SuccessHook { error, .. } => Some(error),
      TaskFailure::Panicked => None,
    }
  }
}

/// A unit of work for an [`ExecutionPool`](crate::ExecutionPool).
///
/// A task is a producer future plus two optional hooks. The success hook sees
/// a clone of the produced value and may fail; the error hook receives a
/// [`TaskFailure`] describing whatever went wrong. Both hooks default to no-ops.
///
/// ```ignore
/// let task = ExecutionTask::new(|| async { fetch_page(3).await })
///   .on_success(|page| async move { store(page).await })
///   .on_error(|failure| async move { tracing::warn!(kind = failure.kind(), "page lost") });
/// ```
pub struct ExecutionTask<R, E> {
  pub(crate) producer: Producer<R, E>,
  pub(crate) on_success: SuccessHook<R, E>,
  pub(crate) on_error: ErrorHook<R, E>,
}

impl<R: Send + 'static, E: Send + 'static> ExecutionTask<R, E> {
  /// Creates a task from its producer. The producer is not invoked until a
  /// pool run claims the task.
  pub fn new<F, Fut>(producer: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
  {
    Self {
      producer: Box::new(move || -> TaskFuture<Result<R, E>> { Box::pin(producer()) }),
      on_success: Box::new(|_: R| -> TaskFuture<Result<(), E>> { Box::pin(async { Ok(()) }) }),
      on_error: Box::new(|_: TaskFailure<R, E>| -> TaskFuture<()> { Box::pin(async {}) }),
    }
  }

  /// Sets the hook invoked with the produced value. An `Err` from the hook
  /// drops the value from the run's results and triggers the error hook.
  pub fn on_success<F, Fut>(mut self, hook: F) -> Self
  where
    F: FnOnce(R) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    self.on_success = Box::new(move |result: R| -> TaskFuture<Result<(), E>> { Box::pin(hook(result)) });
    self
  }

  /// Sets the hook invoked once if the task fails at any stage.
  pub fn on_error<F, Fut>(mut self, hook: F) -> Self
  where
    F: FnOnce(TaskFailure<R, E>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.on_error = Box::new(move |failure: TaskFailure<R, E>| -> TaskFuture<()> { Box::pin(hook(failure)) });
    self
  }
}

impl<R, E> fmt::Debug for ExecutionTask<R, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutionTask").finish_non_exhaustive()
  }
}
