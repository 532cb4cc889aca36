use crate::error::PoolError;
use crate::task::{ExecutionTask, TaskFailure};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_POOL_RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Shared claim cursor over a run's snapshot. Each item carries its
/// submission index so results can be re-sorted afterwards.
type RunCursor<R, E> = Mutex<std::iter::Enumerate<std::vec::IntoIter<ExecutionTask<R, E>>>>;

/// Executes queued tasks with at most `concurrency` of them in flight.
///
/// Tasks accumulate through [`enqueue`](Self::enqueue) and are only started by
/// [`run`](Self::run), which takes the whole pending queue as a snapshot and
/// drains it with `min(concurrency, snapshot_len)` lanes. Each lane claims the
/// next unclaimed task from a shared cursor until the snapshot is exhausted.
///
/// Lanes are polled cooperatively on the caller's task; no task is spawned.
///
/// `run` must not be called again on the same pool before the previous call
/// has resolved. Overlapping runs each get their own snapshot, but nothing
/// else is guaranteed about them.
pub struct ExecutionPool<R, E> {
  pool_name: Arc<String>,
  concurrency: usize,
  pending: Mutex<Vec<ExecutionTask<R, E>>>,
}

impl<R, E> ExecutionPool<R, E>
where
  R: Clone + Send + 'static,
  E: Send + 'static,
{
  /// Creates an empty pool.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidConfiguration` if `concurrency` is zero.
  pub fn new(concurrency: usize, pool_name: &str) -> Result<Self, PoolError> {
    validate_concurrency(concurrency)?;
    debug!(pool_name = %pool_name, concurrency, "Execution pool created.");
    Ok(Self {
      pool_name: Arc::new(pool_name.to_string()),
      concurrency,
      pending: Mutex::new(Vec::new()),
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Maximum number of tasks executed simultaneously during a run.
  pub fn concurrency(&self) -> usize {
    self.concurrency
  }

  /// Changes the concurrency limit used by subsequent runs.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidConfiguration` if `concurrency` is zero; the
  /// previous limit is kept.
  pub fn set_concurrency(&mut self, concurrency: usize) -> Result<(), PoolError> {
    validate_concurrency(concurrency)?;
    debug!(pool_name = %*self.pool_name, from = self.concurrency, to = concurrency, "Concurrency limit changed.");
    self.concurrency = concurrency;
    Ok(())
  }

  /// Adds a task to be executed by the next call to `run`.
  pub fn enqueue(&self, task: ExecutionTask<R, E>) {
    let mut pending = self.pending.lock();
    pending.push(task);
    trace!(pool_name = %*self.pool_name, pending = pending.len(), "Task enqueued.");
  }

  /// Returns the number of tasks waiting for the next run.
  pub fn pending_count(&self) -> usize {
    self.pending.lock().len()
  }

  /// Drops every pending task without executing it.
  pub fn clear(&self) {
    let dropped = std::mem::take(&mut *self.pending.lock()).len();
    debug!(pool_name = %*self.pool_name, dropped, "Pending queue cleared.");
  }

  /// Takes every pending task and executes them, returning the values of the
  /// tasks that succeeded.
  ///
  /// Results are grouped by lane: all of lane 0's results, then lane 1's, and
  /// so on. Failed tasks contribute nothing. Use [`run_ordered`](Self::run_ordered)
  /// for submission order.
  pub async fn run(&self) -> Vec<R> {
    self.execute(None).await.into_iter().map(|(_, result)| result).collect()
  }

  /// Like [`run`](Self::run), but returns results in the order their tasks
  /// were enqueued.
  pub async fn run_ordered(&self) -> Vec<R> {
    let mut indexed = self.execute(None).await;
    indexed.sort_unstable_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
  }

  /// Like [`run`](Self::run), but lanes stop claiming new tasks once `token`
  /// is cancelled. Tasks already in flight finish normally. Unclaimed tasks
  /// are dropped without invoking any of their hooks and are not requeued.
  pub async fn run_until_cancelled(&self, token: &CancellationToken) -> Vec<R> {
    self.execute(Some(token)).await.into_iter().map(|(_, result)| result).collect()
  }

  async fn execute(&self, cancel_token: Option<&CancellationToken>) -> Vec<(usize, R)> {
    // Snapshot and clear in one critical section; later enqueues go to the next run.
    let snapshot = std::mem::take(&mut *self.pending.lock());
    let run_id = NEXT_POOL_RUN_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);

    if snapshot.is_empty() {
      debug!(pool_name = %*self.pool_name, run_id, "Run started with an empty queue; nothing to do.");
      return Vec::new();
    }

    let task_count = snapshot.len();
    let lane_count = self.concurrency.min(task_count);
    info!(pool_name = %*self.pool_name, run_id, task_count, lane_count, "Run started.");

    let cursor: RunCursor<R, E> = Mutex::new(snapshot.into_iter().enumerate());

    let lanes = (0..lane_count).map(|lane| {
      Self::run_lane(self.pool_name.clone(), lane, &cursor, cancel_token).instrument(info_span!(
        "execution_lane",
        pool_name = %*self.pool_name,
        run_id,
        lane
      ))
    });
    let lane_results = join_all(lanes).await;

    let skipped = cursor.lock().len();
    if skipped > 0 {
      warn!(pool_name = %*self.pool_name, run_id, skipped, "Run cancelled; unclaimed tasks were dropped.");
    }

    let results: Vec<(usize, R)> = lane_results.into_iter().flatten().collect();
    info!(
      pool_name = %*self.pool_name,
      run_id,
      succeeded = results.len(),
      failed = task_count - skipped - results.len(),
      skipped,
      "Run finished."
    );
    results
  }

  async fn run_lane(
    pool_name: Arc<String>,
    lane: usize,
    cursor: &RunCursor<R, E>,
    cancel_token: Option<&CancellationToken>,
  ) -> Vec<(usize, R)> {
    let mut results = Vec::new();

    loop {
      if cancel_token.is_some_and(|token| token.is_cancelled()) {
        debug!(pool_name = %*pool_name, lane, "Cancellation observed; lane stops claiming tasks.");
        break;
      }

      // The guard is a temporary and is released before any await.
      let claimed = cursor.lock().next();
      let Some((task_index, task)) = claimed else {
        break;
      };
      trace!(pool_name = %*pool_name, lane, task_index, "Claimed task.");

      if let Some(result) = Self::execute_task(&pool_name, task_index, task).await {
        results.push((task_index, result));
      }
    }

    trace!(pool_name = %*pool_name, lane, completed = results.len(), "Lane drained.");
    results
  }

  /// Runs one task through producer, success hook and, on failure, error hook.
  /// Returns the produced value only if both producer and success hook succeeded.
  async fn execute_task(pool_name: &str, task_index: usize, task: ExecutionTask<R, E>) -> Option<R> {
    let ExecutionTask {
      producer,
      on_success,
      on_error,
    } = task;

    let failure = match AssertUnwindSafe(async move { producer().await }).catch_unwind().await {
      Ok(Ok(result)) => {
        let hook_input = result.clone();
        match AssertUnwindSafe(async move { on_success(hook_input).await })
          .catch_unwind()
          .await
        {
          Ok(Ok(())) => {
            trace!(pool_name = %pool_name, task_index, "Task succeeded.");
            return Some(result);
          }
          Ok(Err(error)) => TaskFailure::SuccessHook { result, error },
          Err(_panic_payload) => {
            error!(pool_name = %pool_name, task_index, "Success hook panicked.");
            TaskFailure::Panicked
          }
        }
      }
      Ok(Err(error)) => TaskFailure::Producer(error),
      Err(_panic_payload) => {
        error!(pool_name = %pool_name, task_index, "Task producer panicked.");
        TaskFailure::Panicked
      }
    };

    debug!(pool_name = %pool_name, task_index, failure = failure.kind(), "Task failed; invoking error hook.");
    if AssertUnwindSafe(async move { on_error(failure).await })
      .catch_unwind()
      .await
      .is_err()
    {
      error!(pool_name = %pool_name, task_index, "Error hook panicked.");
    }
    None
  }
}

impl<R, E> fmt::Debug for ExecutionPool<R, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutionPool")
      .field("pool_name", &self.pool_name)
      .field("concurrency", &self.concurrency)
      .field("pending", &self.pending.lock().len())
      .finish()
  }
}

fn validate_concurrency(concurrency: usize) -> Result<(), PoolError> {
  if concurrency == 0 {
    warn!("Rejected execution pool concurrency of 0.");
    return Err(PoolError::InvalidConfiguration(concurrency));
  }
  Ok(())
}
