use handy_pool::{RepeatableTimer, ResettableTimer};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle as TokioHandle;
use tokio::time::sleep;

type EventLog = Arc<parking_lot::Mutex<Vec<String>>>;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,handy_pool=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

// Builds a resettable timer that logs "start" and "finish" into `events`.
fn logging_timer(events: &EventLog, default_ms: u64) -> ResettableTimer {
  let start_events = events.clone();
  let finish_events = events.clone();
  ResettableTimer::new(
    move || start_events.lock().push("start".to_string()),
    move || finish_events.lock().push("finish".to_string()),
    Duration::from_millis(default_ms),
    TokioHandle::current(),
  )
}

fn count(events: &EventLog, name: &str) -> usize {
  events.lock().iter().filter(|event| event.as_str() == name).count()
}

#[tokio::test]
async fn test_reset_starts_immediately_and_finishes_later() {
  setup_tracing_for_test();
  let events = EventLog::default();
  let timer = logging_timer(&events, 40);

  timer.reset(None);
  assert_eq!(count(&events, "start"), 1);
  assert_eq!(count(&events, "finish"), 0);
  assert!(timer.is_pending());

  sleep(Duration::from_millis(120)).await;
  assert_eq!(*events.lock(), vec!["start".to_string(), "finish".to_string()]);
  assert!(!timer.is_pending());
}

#[tokio::test]
async fn test_reset_supersedes_pending_firing() {
  setup_tracing_for_test();
  let events = EventLog::default();
  let timer = logging_timer(&events, 100);

  timer.reset(None);
  sleep(Duration::from_millis(40)).await;
  timer.reset(None);

  // The first arming would have fired at ~100ms.
  sleep(Duration::from_millis(70)).await;
  assert_eq!(count(&events, "finish"), 0);

  sleep(Duration::from_millis(120)).await;
  assert_eq!(count(&events, "start"), 2);
  assert_eq!(count(&events, "finish"), 1);
}

#[tokio::test]
async fn test_reset_then_runs_once_after_finish() {
  setup_tracing_for_test();
  let events = EventLog::default();
  let timer = logging_timer(&events, 200);

  let once_events = events.clone();
  timer.reset_then(Some(Duration::from_millis(20)), move || once_events.lock().push("once".to_string()));
  sleep(Duration::from_millis(100)).await;
  assert_eq!(
    *events.lock(),
    vec!["start".to_string(), "finish".to_string(), "once".to_string()]
  );

  // The once-callback belonged to the previous arming only.
  timer.reset(Some(Duration::from_millis(20)));
  sleep(Duration::from_millis(100)).await;
  assert_eq!(count(&events, "once"), 1);
  assert_eq!(count(&events, "finish"), 2);
}

#[tokio::test]
async fn test_complete_fires_immediately_once() {
  setup_tracing_for_test();
  let events = EventLog::default();
  let timer = logging_timer(&events, 80);

  assert!(!timer.complete(), "Nothing pending yet.");

  let once_events = events.clone();
  timer.reset_then(None, move || once_events.lock().push("once".to_string()));
  assert!(timer.complete());
  assert_eq!(
    *events.lock(),
    vec!["start".to_string(), "finish".to_string(), "once".to_string()]
  );
  assert!(!timer.complete());

  sleep(Duration::from_millis(150)).await;
  assert_eq!(count(&events, "finish"), 1, "The cancelled sleeper must not fire again.");
}

#[tokio::test]
async fn test_clear_suppresses_firing() {
  setup_tracing_for_test();
  let events = EventLog::default();
  let timer = logging_timer(&events, 30);

  let once_events = events.clone();
  timer.reset_then(None, move || once_events.lock().push("once".to_string()));
  timer.clear();
  assert!(!timer.is_pending());
  assert!(!timer.complete());

  sleep(Duration::from_millis(100)).await;
  assert_eq!(*events.lock(), vec!["start".to_string()]);
}

#[tokio::test]
async fn test_dropping_resettable_timer_cancels_firing() {
  setup_tracing_for_test();
  let events = EventLog::default();
  {
    let timer = logging_timer(&events, 30);
    timer.reset(None);
  }
  sleep(Duration::from_millis(100)).await;
  assert_eq!(count(&events, "finish"), 0);
}

#[tokio::test]
async fn test_repeatable_timer_uses_latest_arguments() {
  setup_tracing_for_test();
  let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
  let recorded = calls.clone();
  let timer = RepeatableTimer::new(
    move |value: u32| recorded.lock().push(value),
    Duration::from_millis(30),
    TokioHandle::current(),
  );

  timer.reset(None, 1);
  timer.reset(None, 2);
  assert!(timer.is_pending());
  sleep(Duration::from_millis(100)).await;
  assert_eq!(*calls.lock(), vec![2]);
  assert!(!timer.is_pending());

  timer.reset(Some(Duration::from_millis(10)), 3);
  sleep(Duration::from_millis(80)).await;
  assert_eq!(*calls.lock(), vec![2, 3], "Each arming invokes the callback exactly once.");
}

#[tokio::test]
async fn test_repeatable_timer_clear() {
  setup_tracing_for_test();
  let calls = Arc::new(parking_lot::Mutex::new(Vec::new()));
  let recorded = calls.clone();
  let timer = RepeatableTimer::new(
    move |value: &'static str| recorded.lock().push(value),
    Duration::from_millis(30),
    TokioHandle::current(),
  );

  timer.reset(None, "cleared");
  timer.clear();
  assert!(!timer.is_pending());
  sleep(Duration::from_millis(100)).await;
  assert!(calls.lock().is_empty());
}
