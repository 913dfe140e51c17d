use crate::context::CancelContext;
use crate::envelope::Envelope;
use crate::error::JobError;
use crate::job::Job;
use crate::queue::QueueConsumer;

use std::sync::Arc;

use kanal::AsyncSender;
use tokio::runtime::Handle as TokioHandle;
use tracing::{debug, error, info, trace, warn};

/// Drains `jobs` until the queue is exhausted or `ctx` fires.
///
/// Each callable runs on `tokio_handle`'s blocking pool, so synchronous work in
/// one worker never stalls the others. Cancellation is only observed between
/// jobs; a job that has started runs to completion.
pub(crate) async fn run_worker<C>(
  pool_name: Arc<String>,
  worker_id: usize,
  tokio_handle: TokioHandle,
  jobs: QueueConsumer,
  results: AsyncSender<Envelope>,
  ctx: C,
) where
  C: CancelContext + Clone + 'static,
{
  info!(pool_name = %*pool_name, worker_id, "Worker started.");
  let mut processed = 0usize;

  loop {
    tokio::select! {
      biased;

      cause = ctx.cancelled() => {
        info!(pool_name = %*pool_name, worker_id, processed, %cause, "Cancellation observed. Worker stopping.");
        if results.send(Envelope::Cancelled { cause }).await.is_err() {
          warn!(pool_name = %*pool_name, worker_id, "Results stream closed; cancellation envelope dropped.");
        }
        break;
      }

      received = jobs.recv() => {
        let Some(job) = received else {
          debug!(pool_name = %*pool_name, worker_id, processed, "Job queue closed and drained. Worker exiting.");
          break;
        };

        let envelope = execute(&pool_name, worker_id, &tokio_handle, job, &ctx).await;
        processed += 1;
        if results.send(envelope).await.is_err() {
          warn!(pool_name = %*pool_name, worker_id, "Results stream closed; envelope dropped.");
        }
      }
    }
  }

  trace!(pool_name = %*pool_name, worker_id, "Worker loop stopped.");
}

async fn execute<C>(pool_name: &str, worker_id: usize, tokio_handle: &TokioHandle, job: Job, ctx: &C) -> Envelope
where
  C: CancelContext + Clone + 'static,
{
  let id = job.id.clone();
  let job_id = String::from_utf8_lossy(&id).into_owned();
  debug!(pool_name, worker_id, %job_id, "Executing job.");

  let ctx = ctx.clone();
  match tokio_handle.spawn_blocking(move || job.exec(&ctx)).await {
    Ok(Ok(done)) => {
      trace!(pool_name, worker_id, %job_id, "Job completed.");
      Envelope::Completed {
        id,
        result: done.result.unwrap_or_default(),
      }
    }
    Ok(Err(error)) => {
      warn!(pool_name, worker_id, %job_id, %error, "Job rejected.");
      Envelope::Failed { id, error }
    }
    Err(join_error) if join_error.is_panic() => {
      error!(pool_name, worker_id, %job_id, "Job callable panicked.");
      Envelope::Failed {
        id,
        error: JobError::Panicked,
      }
    }
    Err(join_error) => {
      error!(pool_name, worker_id, %job_id, error = %join_error, "Job task aborted before finishing.");
      Envelope::Failed {
        id,
        error: JobError::Aborted,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::func::func1;
  use crate::job::create_job;
  use crate::queue::JobQueue;
  use crate::value::Value;

  fn pool_name() -> Arc<String> {
    Arc::new("worker_test".to_string())
  }

  #[tokio::test]
  async fn test_worker_processes_jobs_in_received_order() {
    let (producer, consumer) = JobQueue::new(8).split();
    let (tx, rx) = kanal::bounded_async(8);
    let f = func1(|_ctx: &dyn CancelContext, i: i64| Ok::<_, String>(i + 1));

    producer
      .send_all((0..5i64).map(|i| create_job(i.to_string(), f.clone(), i)))
      .await
      .unwrap();
    run_worker(pool_name(), 0, TokioHandle::current(), consumer, tx, Context::background()).await;

    let mut ids = Vec::new();
    while let Ok(env) = rx.recv().await {
      ids.push(String::from_utf8(env.id().unwrap().to_vec()).unwrap());
    }
    assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
  }

  #[tokio::test]
  async fn test_worker_emits_single_cancel_envelope() {
    let (producer, consumer) = JobQueue::new(4).split();
    let (tx, rx) = kanal::bounded_async(4);
    let f = func1(|_ctx: &dyn CancelContext, i: i64| Ok::<_, String>(i));
    producer
      .send_all((0..4i64).map(|i| create_job(i.to_string(), f.clone(), i)))
      .await
      .unwrap();

    let ctx = Context::with_cancel();
    ctx.cancel();
    run_worker(pool_name(), 0, TokioHandle::current(), consumer, tx, ctx).await;

    let mut envelopes = Vec::new();
    while let Ok(env) = rx.recv().await {
      envelopes.push(env);
    }
    assert_eq!(
      envelopes,
      vec![Envelope::Cancelled {
        cause: crate::context::CancelCause::Cancelled
      }]
    );
  }

  #[tokio::test]
  async fn test_panicking_job_does_not_stop_worker() {
    let (producer, consumer) = JobQueue::new(4).split();
    let (tx, rx) = kanal::bounded_async(4);
    let f = func1(|_ctx: &dyn CancelContext, i: i64| {
      if i == 0 {
        panic!("job zero panics");
      }
      Ok::<_, String>(i)
    });
    producer
      .send_all((0..2i64).map(|i| create_job(i.to_string(), f.clone(), i)))
      .await
      .unwrap();
    run_worker(pool_name(), 0, TokioHandle::current(), consumer, tx, Context::background()).await;

    assert_eq!(
      rx.recv().await.unwrap(),
      Envelope::Failed {
        id: b"0".to_vec(),
        error: JobError::Panicked
      }
    );
    assert_eq!(
      rx.recv().await.unwrap(),
      Envelope::Completed {
        id: b"1".to_vec(),
        result: vec![Value::Int(1), Value::Nil]
      }
    );
  }
}
