use handy_pool::{ExecutionPool, ExecutionTask, TaskFailure};
use std::time::Duration;
use tracing::{info, warn};

async fn fetch_page(id: u32) -> Result<String, String> {
  tokio::time::sleep(Duration::from_millis(200 + u64::from(id) * 50)).await;
  if id == 3 {
    return Err(format!("page {} returned 503", id));
  }
  Ok(format!("<page {}>", id))
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example (concurrency 2) ---");

  let pool = match ExecutionPool::<String, String>::new(2, "page_fetcher") {
    Ok(pool) => pool,
    Err(e) => {
      tracing::error!("Failed to build pool: {}", e);
      return;
    }
  };

  for id in 0..5 {
    let task = ExecutionTask::new(move || fetch_page(id))
      .on_success(move |page| async move {
        info!("Page {} fetched: {}", id, page);
        Ok(())
      })
      .on_error(move |failure: TaskFailure<String, String>| async move {
        warn!("Page {} failed at stage {}: {:?}", id, failure.kind(), failure.error());
      });
    pool.enqueue(task);
  }

  info!("Queued {} tasks. Running.", pool.pending_count());
  let pages = pool.run_ordered().await;
  info!("Run finished with {} pages: {:?}", pages.len(), pages);
  info!("--- Basic Usage Example End ---");
}
