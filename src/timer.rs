use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, trace, Instrument};

type Callback = Arc<dyn Fn() + Send + Sync + 'static>;
type OnceCallback = Box<dyn FnOnce() + Send + 'static>;

/// Tracks the currently armed firing. Every arming bumps `generation`, so a
/// sleeper that wakes up after being superseded can tell it is stale.
#[derive(Debug, Default)]
struct ArmedSlot {
  generation: u64,
  token: Option<CancellationToken>,
}

impl ArmedSlot {
  fn arm(&mut self) -> (u64, CancellationToken) {
    self.disarm();
    let token = CancellationToken::new();
    self.generation = self.generation.wrapping_add(1);
    self.token = Some(token.clone());
    (self.generation, token)
  }

  fn disarm(&mut self) -> bool {
    match self.token.take() {
      Some(token) => {
        token.cancel();
        true
      }
      None => false,
    }
  }

  /// Consumes the armed state if `generation` is still the current one.
  fn settle(&mut self, generation: u64) -> bool {
    if self.generation == generation && self.token.is_some() {
      self.token = None;
      true
    } else {
      false
    }
  }

  fn is_armed(&self) -> bool {
    self.token.is_some()
  }
}

struct ResettableState {
  slot: ArmedSlot,
  once: Option<OnceCallback>,
}

/// A timeout that can be restarted, completed early, or cleared.
///
/// Every [`reset`](Self::reset) calls `start` immediately and schedules
/// `finish` after the given duration, replacing any firing still pending.
pub struct ResettableTimer {
  start: Callback,
  finish: Callback,
  default_duration: Duration,
  state: Arc<Mutex<ResettableState>>,
  tokio_handle: TokioHandle,
}

impl ResettableTimer {
  pub fn new(
    start: impl Fn() + Send + Sync + 'static,
    finish: impl Fn() + Send + Sync + 'static,
    default_duration: Duration,
    tokio_handle: TokioHandle,
  ) -> Self {
    Self {
      start: Arc::new(start),
      finish: Arc::new(finish),
      default_duration,
      state: Arc::new(Mutex::new(ResettableState {
        slot: ArmedSlot::default(),
        once: None,
      })),
      tokio_handle,
    }
  }

  /// Restarts the timeout. `None` uses the default duration.
  pub fn reset(&self, duration: Option<Duration>) {
    self.arm(duration, None);
  }

  /// Restarts the timeout and runs `once` right after `finish` when this
  /// arming fires. A later reset or clear discards `once`.
  pub fn reset_then(&self, duration: Option<Duration>, once: impl FnOnce() + Send + 'static) {
    self.arm(duration, Some(Box::new(once)));
  }

  /// Fires a pending timeout immediately. Returns `false` if nothing was pending.
  pub fn complete(&self) -> bool {
    let once = {
      let mut state = self.state.lock();
      if !state.slot.disarm() {
        return false;
      }
      state.once.take()
    };
    trace!("Resettable timer completed early.");
    Self::fire(&self.finish, once);
    true
  }

  /// Cancels a pending timeout without calling `finish` or the once-callback.
  pub fn clear(&self) {
    let mut state = self.state.lock();
    if state.slot.disarm() {
      trace!("Resettable timer cleared.");
    }
    state.once = None;
  }

  pub fn is_pending(&self) -> bool {
    self.state.lock().slot.is_armed()
  }

  fn arm(&self, duration: Option<Duration>, once: Option<OnceCallback>) {
    let duration = duration.unwrap_or(self.default_duration);
    let (generation, token) = {
      let mut state = self.state.lock();
      state.once = once;
      state.slot.arm()
    };
    (self.start)();
    debug!(generation, ?duration, "Resettable timer armed.");

    let state = self.state.clone();
    let finish = self.finish.clone();
    self.tokio_handle.spawn(
      async move {
        tokio::select! {
          biased;
          _ = token.cancelled() => {
            trace!("Superseded before expiry.");
          }
          _ = tokio::time::sleep(duration) => {
            let once = {
              let mut state = state.lock();
              if !state.slot.settle(generation) {
                return;
              }
              state.once.take()
            };
            Self::fire(&finish, once);
          }
        }
      }
      .instrument(info_span!("resettable_timer", generation)),
    );
  }

  fn fire(finish: &Callback, once: Option<OnceCallback>) {
    finish();
    if let Some(once) = once {
      once();
    }
  }
}

impl fmt::Debug for ResettableTimer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResettableTimer")
      .field("default_duration", &self.default_duration)
      .field("pending", &self.is_pending())
      .finish_non_exhaustive()
  }
}

impl Drop for ResettableTimer {
  fn drop(&mut self) {
    let mut state = self.state.lock();
    if state.slot.disarm() {
      trace!("Resettable timer dropped while pending; firing cancelled.");
    }
    state.once = None;
  }
}

/// A timeout that invokes `callback` with the arguments of the latest
/// [`reset`](Self::reset), once per arming.
pub struct RepeatableTimer<A> {
  callback: Arc<dyn Fn(A) + Send + Sync + 'static>,
  default_duration: Duration,
  slot: Arc<Mutex<ArmedSlot>>,
  tokio_handle: TokioHandle,
}

impl<A: Send + 'static> RepeatableTimer<A> {
  pub fn new(callback: impl Fn(A) + Send + Sync + 'static, default_duration: Duration, tokio_handle: TokioHandle) -> Self {
    Self {
      callback: Arc::new(callback),
      default_duration,
      slot: Arc::new(Mutex::new(ArmedSlot::default())),
      tokio_handle,
    }
  }

  /// Cancels any pending invocation and schedules `callback(args)` after
  /// `duration` (or the default).
  pub fn reset(&self, duration: Option<Duration>, args: A) {
    let duration = duration.unwrap_or(self.default_duration);
    let (generation, token) = self.slot.lock().arm();
    debug!(generation, ?duration, "Repeatable timer armed.");

    let slot = self.slot.clone();
    let callback = self.callback.clone();
    self.tokio_handle.spawn(
      async move {
        tokio::select! {
          biased;
          _ = token.cancelled() => {
            trace!("Superseded before expiry.");
          }
          _ = tokio::time::sleep(duration) => {
            if slot.lock().settle(generation) {
              callback(args);
            }
          }
        }
      }
      .instrument(info_span!("repeatable_timer", generation)),
    );
  }

  /// Cancels the pending invocation, if any.
  pub fn clear(&self) {
    if self.slot.lock().disarm() {
      trace!("Repeatable timer cleared.");
    }
  }

  pub fn is_pending(&self) -> bool {
    self.slot.lock().is_armed()
  }
}

impl<A> fmt::Debug for RepeatableTimer<A> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RepeatableTimer")
      .field("default_duration", &self.default_duration)
      .field("pending", &self.slot.lock().is_armed())
      .finish_non_exhaustive()
  }
}

impl<A> Drop for RepeatableTimer<A> {
  fn drop(&mut self) {
    self.slot.lock().disarm();
  }
}
