use crate::envelope::Envelope;

use std::sync::Arc;

use futures::stream::{self, Stream};
use kanal::AsyncReceiver;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Read side of a pool's results stream.
///
/// Envelopes arrive in the order workers finish them. The stream ends once the
/// pool's run has completed and every envelope has been received. Clones share
/// the same stream; each envelope goes to exactly one of them.
#[derive(Clone)]
pub struct ResultStream {
  pub(crate) pool_name: Arc<String>,
  pub(crate) rx: AsyncReceiver<Envelope>,
}

impl std::fmt::Debug for ResultStream {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ResultStream")
      .field("pool_name", &self.pool_name)
      .field("buffered", &self.rx.len())
      .finish()
  }
}

impl ResultStream {
  /// Waits for the next envelope. `None` once the stream is closed and empty.
  pub async fn recv(&self) -> Option<Envelope> {
    match self.rx.recv().await {
      Ok(envelope) => Some(envelope),
      Err(_) => {
        trace!(pool_name = %*self.pool_name, "Results stream exhausted.");
        None
      }
    }
  }

  /// Drains the stream to its end.
  pub async fn collect_all(&self) -> Vec<Envelope> {
    let mut envelopes = Vec::new();
    while let Some(envelope) = self.recv().await {
      envelopes.push(envelope);
    }
    envelopes
  }

  /// Adapts the stream into a [`futures::Stream`].
  pub fn into_stream(self) -> impl Stream<Item = Envelope> + Send + 'static {
    stream::unfold(self, |results| async move {
      let next = results.recv().await?;
      Some((next, results))
    })
  }
}

/// One-shot signal that fires after every worker has exited and strictly
/// before the results stream closes.
#[derive(Debug, Clone)]
pub struct DoneSignal {
  pub(crate) token: CancellationToken,
}

impl DoneSignal {
  pub fn is_fired(&self) -> bool {
    self.token.is_cancelled()
  }

  pub async fn wait(&self) {
    self.token.cancelled().await
  }
}
