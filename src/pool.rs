use crate::context::CancelContext;
use crate::envelope::Envelope;
use crate::error::PoolError;
use crate::handle::{DoneSignal, ResultStream};
use crate::job::Job;
use crate::queue::{JobQueue, QueueConsumer, QueueProducer};
use crate::worker::run_worker;

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::future::join_all;
use kanal::{AsyncReceiver, AsyncSender};
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Observable lifecycle of a [`JobPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
  /// Neither `submit` nor `run` has been called.
  Unstarted,
  /// Jobs were submitted (the queue is closed); `run` has not started.
  Submitted,
  /// `run` has started and not all workers have exited yet.
  Running,
  /// Every worker has exited; `done` has fired.
  Completed,
}

/// The pieces `run` consumes. Taken exactly once.
struct RunParts {
  jobs: QueueConsumer,
  results_tx: AsyncSender<Envelope>,
}

/// A fixed-size pool of workers draining a one-shot job queue.
///
/// A pool is used once: [`JobPool::submit`] enqueues every job and closes the
/// queue, [`JobPool::run`] spawns the workers and waits for them, and the
/// caller drains [`JobPool::results`]. Submit and run are meant to be driven
/// concurrently; with more jobs than workers, a submit awaited before run
/// would wait forever on the full queue.
pub struct JobPool {
  pool_id: u64,
  pool_name: Arc<String>,
  worker_count: usize,
  tokio_handle: TokioHandle,
  producer: QueueProducer,
  run_parts: Mutex<Option<RunParts>>,
  results_rx: AsyncReceiver<Envelope>,
  done: CancellationToken,
}

impl std::fmt::Debug for JobPool {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("JobPool")
      .field("pool_id", &self.pool_id)
      .field("pool_name", &self.pool_name)
      .field("worker_count", &self.worker_count)
      .field("state", &self.state())
      .finish_non_exhaustive()
  }
}

impl JobPool {
  /// Creates a pool of `worker_count` workers that will be spawned on `tokio_handle`.
  /// The job queue and the results stream are both bounded to `worker_count`.
  ///
  /// # Errors
  /// Returns `PoolError::ZeroWorkers` if `worker_count` is zero.
  pub fn new(worker_count: usize, tokio_handle: TokioHandle, pool_name: &str) -> Result<Arc<Self>, PoolError> {
    if worker_count == 0 {
      error!(pool_name, "Refusing to create a pool without workers.");
      return Err(PoolError::ZeroWorkers(worker_count));
    }

    let pool_id = NEXT_POOL_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let (producer, consumer) = JobQueue::new(worker_count).split();
    let (results_tx, results_rx) = kanal::bounded_async(worker_count);

    info!(pool_name, pool_id, worker_count, "Job pool created.");

    Ok(Arc::new(Self {
      pool_id,
      pool_name: Arc::new(pool_name.to_string()),
      worker_count,
      tokio_handle,
      producer,
      run_parts: Mutex::new(Some(RunParts {
        jobs: consumer,
        results_tx,
      })),
      results_rx,
      done: CancellationToken::new(),
    }))
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn worker_count(&self) -> usize {
    self.worker_count
  }

  pub fn state(&self) -> PoolState {
    if self.done.is_cancelled() {
      PoolState::Completed
    } else if self.run_parts.lock().is_none() {
      PoolState::Running
    } else if self.producer.is_submitted() {
      PoolState::Submitted
    } else {
      PoolState::Unstarted
    }
  }

  /// Enqueues `jobs` in order, then closes the queue. Returns how many jobs were enqueued.
  ///
  /// # Errors
  /// Returns `PoolError::AlreadySubmitted` if called more than once, and
  /// `PoolError::QueueClosed` if every worker exited (e.g. after
  /// cancellation) before all jobs could be enqueued.
  pub async fn submit<I>(&self, jobs: I) -> Result<usize, PoolError>
  where
    I: IntoIterator<Item = Job>,
  {
    debug!(pool_name = %*self.pool_name, "Submitting jobs.");
    match self.producer.send_all(jobs).await {
      Ok(sent) => {
        info!(pool_name = %*self.pool_name, sent, "Job queue filled and closed.");
        Ok(sent)
      }
      Err(PoolError::AlreadySubmitted) => {
        error!(pool_name = %*self.pool_name, "Submit called twice on the same pool.");
        Err(PoolError::AlreadySubmitted)
      }
      Err(e) => {
        warn!(pool_name = %*self.pool_name, "Submit stopped early: {}", e);
        Err(e)
      }
    }
  }

  /// Spawns the workers, all sharing `ctx`, and waits until every one has
  /// exited. Then fires `done`, then closes the results stream.
  ///
  /// # Errors
  /// Returns `PoolError::AlreadyRunning` if called more than once.
  pub async fn run<C>(&self, ctx: C) -> Result<(), PoolError>
  where
    C: CancelContext + Clone + 'static,
  {
    let Some(RunParts { jobs, results_tx }) = self.run_parts.lock().take() else {
      error!(pool_name = %*self.pool_name, "Run called twice on the same pool.");
      return Err(PoolError::AlreadyRunning);
    };

    info!(pool_name = %*self.pool_name, worker_count = self.worker_count, "Spawning workers.");
    let handles: Vec<_> = (0..self.worker_count)
      .map(|worker_id| {
        self.tokio_handle.spawn(
          run_worker(
            self.pool_name.clone(),
            worker_id,
            self.tokio_handle.clone(),
            jobs.clone(),
            results_tx.clone(),
            ctx.clone(),
          )
          .instrument(info_span!("job_pool_worker", pool_name = %*self.pool_name, pool_id = self.pool_id, worker_id)),
        )
      })
      .collect();
    drop(jobs);

    for (worker_id, joined) in join_all(handles).await.into_iter().enumerate() {
      if let Err(join_error) = joined {
        error!(pool_name = %*self.pool_name, worker_id, "Worker task failed to join: {:?}", join_error);
      }
    }

    self.done.cancel();
    drop(results_tx);
    info!(pool_name = %*self.pool_name, "All workers exited. Done fired and results stream closed.");
    Ok(())
  }

  /// The results stream. Every call returns a handle onto the same stream.
  pub fn results(&self) -> ResultStream {
    ResultStream {
      pool_name: self.pool_name.clone(),
      rx: self.results_rx.clone(),
    }
  }

  /// The completion signal.
  pub fn done(&self) -> DoneSignal {
    DoneSignal {
      token: self.done.clone(),
    }
  }
}
