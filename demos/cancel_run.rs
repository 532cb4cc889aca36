use handy_pool::{ExecutionPool, ExecutionTask};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Cancel Run Example ---");

  let pool = ExecutionPool::<u32, String>::new(2, "cancellable_pool").expect("concurrency is non-zero");
  for id in 0..10 {
    pool.enqueue(ExecutionTask::new(move || async move {
      info!("Task {} starting (takes 1s).", id);
      tokio::time::sleep(Duration::from_secs(1)).await;
      Ok(id)
    }));
  }

  let token = CancellationToken::new();
  let canceller = token.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(2500)).await;
    info!("Requesting cancellation; in-flight tasks will still finish.");
    canceller.cancel();
  });

  let results = pool.run_until_cancelled(&token).await;
  info!("Completed {} of 10 tasks: {:?}", results.len(), results);
  info!("--- Cancel Run Example End ---");
}
