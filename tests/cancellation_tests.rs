use job_pool::{
  create_job, func1, CancelCause, CancelContext, Context, Envelope, EnvelopeKind, Func, Job, JobPool, PoolError,
  Value,
};
use std::time::Duration;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::sync::CancellationToken;

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,job_pool=debug"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

fn times_hundred() -> Func {
  func1(|_ctx: &dyn CancelContext, i: i64| Ok::<_, String>(i * 100))
}

fn create_n_jobs(count: i64, func: Func) -> Vec<Job> {
  (0..count).map(|i| create_job(i.to_string(), func.clone(), i)).collect()
}

// Runs the pool to completion, failing the test instead of hanging.
async fn drive_with_limit<C>(pool: &JobPool, jobs: Vec<Job>, ctx: C) -> (Result<usize, PoolError>, Vec<Envelope>)
where
  C: CancelContext + Clone + 'static,
{
  let results = pool.results();
  let all = async {
    let (submitted, ran, envelopes) = tokio::join!(pool.submit(jobs), pool.run(ctx), results.collect_all());
    ran.expect("run should succeed once");
    (submitted, envelopes)
  };
  tokio::time::timeout(Duration::from_secs(5), all)
    .await
    .expect("pool must terminate after cancellation")
}

fn count_kind(envelopes: &[Envelope], kind: EnvelopeKind) -> usize {
  envelopes.iter().filter(|e| e.kind() == kind).count()
}

#[tokio::test]
async fn test_cancelled_before_run_every_worker_reports_cause() {
  setup_tracing_for_test();
  let pool = JobPool::new(10, TokioHandle::current(), "test_cancel_before_run").unwrap();
  let ctx = Context::with_cancel();
  ctx.cancel();

  let (submitted, envelopes) = drive_with_limit(&pool, create_n_jobs(100, times_hundred()), ctx).await;

  assert_eq!(count_kind(&envelopes, EnvelopeKind::Cancelled), 10);
  assert_eq!(count_kind(&envelopes, EnvelopeKind::Completed), 0);
  assert!(envelopes
    .iter()
    .all(|e| e.cancel_cause() == Some(CancelCause::Cancelled)));
  // Workers exited while the submitter still held jobs.
  assert!(matches!(submitted, Err(PoolError::QueueClosed(_))));
  assert!(pool.done().is_fired());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_expired_deadline_reports_deadline_exceeded() {
  setup_tracing_for_test();
  let pool = JobPool::new(10, TokioHandle::current(), "test_deadline").unwrap();
  let ctx = Context::with_timeout(Duration::from_nanos(10));
  tokio::time::sleep(Duration::from_millis(1)).await;

  let (_, envelopes) = drive_with_limit(&pool, create_n_jobs(100, times_hundred()), ctx).await;

  assert!(count_kind(&envelopes, EnvelopeKind::Cancelled) >= 1);
  for env in &envelopes {
    match env {
      Envelope::Cancelled { cause } => assert_eq!(*cause, CancelCause::DeadlineExceeded),
      Envelope::Completed { id, result } => {
        let id: i64 = std::str::from_utf8(id).unwrap().parse().unwrap();
        assert_eq!(result[0], Value::Int(id * 100));
      }
      other => panic!("unexpected envelope {:?}", other),
    }
  }
}

#[tokio::test]
async fn test_cancel_mid_run_lets_current_job_finish_and_abandons_rest() {
  setup_tracing_for_test();
  let ctx = Context::with_cancel();
  let trigger = ctx.clone();
  // Job 2 cancels the shared context while it is running.
  let cancels_at_two = func1(move |_ctx: &dyn CancelContext, i: i64| {
    if i == 2 {
      trigger.cancel();
    }
    Ok::<_, String>(i)
  });

  let pool = JobPool::new(1, TokioHandle::current(), "test_cancel_mid_run").unwrap();
  let (_, envelopes) = drive_with_limit(&pool, create_n_jobs(10, cancels_at_two), ctx).await;

  let completed: Vec<&[u8]> = envelopes
    .iter()
    .filter(|e| e.kind() == EnvelopeKind::Completed)
    .filter_map(Envelope::id)
    .collect();
  assert_eq!(completed, vec![&b"0"[..], &b"1"[..], &b"2"[..]]);
  assert_eq!(
    envelopes.last(),
    Some(&Envelope::Cancelled {
      cause: CancelCause::Cancelled
    })
  );
  assert_eq!(envelopes.len(), 4);
}

#[tokio::test]
async fn test_callable_observes_the_run_context() {
  setup_tracing_for_test();
  let ctx = Context::with_cancel();
  let trigger = ctx.clone();
  let reports = func1(move |ctx: &dyn CancelContext, _: i64| {
    let before = ctx.is_cancelled();
    trigger.cancel();
    Ok::<_, String>(before != ctx.is_cancelled())
  });

  let pool = JobPool::new(1, TokioHandle::current(), "test_callable_ctx").unwrap();
  let (_, envelopes) = drive_with_limit(&pool, create_n_jobs(1, reports), ctx).await;
  assert_eq!(envelopes[0].result().unwrap()[0], Value::Bool(true));
}

#[tokio::test]
async fn test_cancellation_token_as_run_context() {
  setup_tracing_for_test();
  let pool = JobPool::new(3, TokioHandle::current(), "test_token_ctx").unwrap();
  let token = CancellationToken::new();
  token.cancel();

  let (_, envelopes) = drive_with_limit(&pool, create_n_jobs(2, times_hundred()), token).await;
  assert_eq!(count_kind(&envelopes, EnvelopeKind::Cancelled), 3);
}

#[tokio::test]
async fn test_submit_after_cancelled_run_fails_instead_of_hanging() {
  setup_tracing_for_test();
  let pool = JobPool::new(1, TokioHandle::current(), "test_submit_after_run").unwrap();
  let results = pool.results();
  let ctx = Context::with_cancel();
  ctx.cancel();

  let (ran, envelopes) = tokio::join!(pool.run(ctx), results.collect_all());
  ran.unwrap();
  assert_eq!(envelopes.len(), 1);

  let submitted = tokio::time::timeout(Duration::from_secs(5), pool.submit(create_n_jobs(5, times_hundred())))
    .await
    .expect("submit must not hang once workers are gone");
  assert!(matches!(submitted, Err(PoolError::QueueClosed(_))));
}
