use job_pool::{create_job, func1, CancelContext, Context, Envelope, JobPool};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

fn slow_square(_ctx: &dyn CancelContext, n: i64) -> Result<i64, String> {
  std::thread::sleep(Duration::from_millis(20));
  if n == 13 {
    return Err(format!("{} is unlucky", n));
  }
  Ok(n * n)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Fan-out Example ---");

  let pool = JobPool::new(4, Handle::current(), "fan_out_pool").expect("four workers is a valid pool");
  let square = func1(slow_square);
  let jobs: Vec<_> = (0..40i64)
    .map(|n| create_job(format!("square-{}", n), square.clone(), n))
    .collect();

  // Stop whatever is left after 150ms.
  let ctx = Context::with_timeout(Duration::from_millis(150));
  let results = pool.results();

  let (submitted, ran, envelopes) = tokio::join!(pool.submit(jobs), pool.run(ctx), results.collect_all());
  info!("Submit outcome: {:?}", submitted);
  ran.expect("pool runs once");

  for envelope in &envelopes {
    match envelope {
      Envelope::Completed { id, result } => match envelope.invocation_error() {
        Some(e) => info!("{}: failed inside callable: {}", String::from_utf8_lossy(id), e),
        None => info!("{}: {:?}", String::from_utf8_lossy(id), result[0]),
      },
      Envelope::Failed { id, error } => info!("{}: rejected: {}", String::from_utf8_lossy(id), error),
      Envelope::Cancelled { cause } => info!("worker stopped: {}", cause),
    }
  }

  info!("Received {} envelopes; done fired: {}", envelopes.len(), pool.done().is_fired());
  info!("--- Fan-out Example End ---");
}
