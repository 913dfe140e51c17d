use crate::error::PoolError;
use crate::job::Job;

use kanal::{AsyncReceiver, AsyncSender};
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, warn};

/// A bounded, multi-consumer queue of jobs, filled exactly once.
///
/// The queue is closed by dropping its only sender after the last job has
/// been enqueued; consumers then drain what is left and see exhaustion.
pub(crate) struct JobQueue {
  tx: AsyncSender<Job>,
  rx: AsyncReceiver<Job>,
}

impl JobQueue {
  pub(crate) fn new(capacity: usize) -> Self {
    let (tx, rx) = kanal::bounded_async(capacity);
    Self { tx, rx }
  }

  /// Splits the queue into its one-shot producer and clonable consumer halves.
  pub(crate) fn split(self) -> (QueueProducer, QueueConsumer) {
    (
      QueueProducer {
        tx: Mutex::new(Some(self.tx)),
      },
      QueueConsumer { rx: self.rx },
    )
  }
}

/// The producer half. Holds the only sender until [`QueueProducer::send_all`] takes it.
pub(crate) struct QueueProducer {
  tx: Mutex<Option<AsyncSender<Job>>>,
}

impl fmt::Debug for QueueProducer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueueProducer")
      .field("submitted", &self.is_submitted())
      .finish()
  }
}

impl QueueProducer {
  /// Enqueues `jobs` in order, then closes the queue.
  ///
  /// Waits while the queue is full. Fails with `AlreadySubmitted` on a second
  /// call, and with `QueueClosed` if every consumer is gone before all jobs
  /// were enqueued. Either way the queue ends up closed.
  pub(crate) async fn send_all<I>(&self, jobs: I) -> Result<usize, PoolError>
  where
    I: IntoIterator<Item = Job>,
  {
    let tx = self.tx.lock().take().ok_or(PoolError::AlreadySubmitted)?;

    let mut sent = 0usize;
    for job in jobs {
      let job_id = String::from_utf8_lossy(&job.id).into_owned();
      if let Err(send_error) = tx.send(job).await {
        warn!(%job_id, sent, "Queue: consumers gone before all jobs were enqueued: {:?}", send_error);
        return Err(PoolError::QueueClosed(format!("{:?}", send_error)));
      }
      sent += 1;
    }
    debug!(sent, "Queue: all jobs enqueued, closing.");
    drop(tx);
    Ok(sent)
  }

  pub(crate) fn is_submitted(&self) -> bool {
    self.tx.lock().is_none()
  }
}

/// The consumer half, cloned once per worker.
#[derive(Clone)]
pub(crate) struct QueueConsumer {
  rx: AsyncReceiver<Job>,
}

impl QueueConsumer {
  /// Receives the next job, or `None` once the queue is closed and drained.
  pub(crate) async fn recv(&self) -> Option<Job> {
    self.rx.recv().await.ok()
  }
}
