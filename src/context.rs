use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a cancellation context fired.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
  #[error("context cancelled")]
  Cancelled,

  #[error("context deadline exceeded")]
  DeadlineExceeded,
}

/// A cancellation-bearing context shared by every worker of a run and handed
/// to each callable as its leading parameter.
pub trait CancelContext: Send + Sync {
  /// The cause, once cancellation has fired. `None` while still live.
  fn cause(&self) -> Option<CancelCause>;

  fn is_cancelled(&self) -> bool {
    self.cause().is_some()
  }

  /// Resolves with the cause once cancellation fires.
  fn cancelled(&self) -> BoxFuture<'_, CancelCause>;
}

struct ContextInner {
  token: CancellationToken,
  deadline: Option<Instant>,
  cause: Mutex<Option<CancelCause>>,
  parent: Option<Context>,
}

/// The default [`CancelContext`]: explicit cancellation plus an optional deadline.
///
/// Clones share state. A child context fires when its parent fires and
/// inherits the parent's cause.
#[derive(Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl std::fmt::Debug for Context {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Context")
      .field("deadline", &self.inner.deadline)
      .field("cause", &self.cause())
      .finish_non_exhaustive()
  }
}

impl Context {
  fn build(token: CancellationToken, deadline: Option<Instant>, parent: Option<Context>) -> Self {
    Self {
      inner: Arc::new(ContextInner {
        token,
        deadline,
        cause: Mutex::new(None),
        parent,
      }),
    }
  }

  /// A context that only fires when [`Context::cancel`] is called.
  pub fn background() -> Self {
    Self::build(CancellationToken::new(), None, None)
  }

  /// Same as [`Context::background`]; reads better at call sites that cancel explicitly.
  pub fn with_cancel() -> Self {
    Self::background()
  }

  /// Fires with [`CancelCause::DeadlineExceeded`] once `timeout` has elapsed.
  pub fn with_timeout(timeout: Duration) -> Self {
    Self::with_deadline(Instant::now() + timeout)
  }

  pub fn with_deadline(deadline: Instant) -> Self {
    Self::build(CancellationToken::new(), Some(deadline), None)
  }

  /// Derives a context that fires when either it or `self` is cancelled.
  /// The child's deadline is the earlier of its parent's and `timeout`, if given.
  pub fn child(&self, timeout: Option<Duration>) -> Self {
    let own = timeout.map(|t| Instant::now() + t);
    let deadline = match (self.inner.deadline, own) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    };
    Self::build(self.inner.token.child_token(), deadline, Some(self.clone()))
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.inner.deadline
  }

  /// Cancels this context and every child derived from it.
  /// The first recorded cause wins; later calls are no-ops.
  pub fn cancel(&self) {
    self.fire(CancelCause::Cancelled);
  }

  fn fire(&self, cause: CancelCause) {
    {
      let mut slot = self.inner.cause.lock();
      if slot.is_none() {
        *slot = Some(cause);
      }
    }
    self.inner.token.cancel();
  }

  fn deadline_passed(&self) -> bool {
    self.inner.deadline.is_some_and(|d| Instant::now() >= d)
  }
}

impl CancelContext for Context {
  fn cause(&self) -> Option<CancelCause> {
    if let Some(cause) = *self.inner.cause.lock() {
      return Some(cause);
    }
    if let Some(cause) = self.inner.parent.as_ref().and_then(|p| p.cause()) {
      return Some(cause);
    }
    if self.deadline_passed() {
      self.fire(CancelCause::DeadlineExceeded);
      return Some(CancelCause::DeadlineExceeded);
    }
    if self.inner.token.is_cancelled() {
      return Some(CancelCause::Cancelled);
    }
    None
  }

  fn cancelled(&self) -> BoxFuture<'_, CancelCause> {
    async move {
      if let Some(cause) = self.cause() {
        return cause;
      }
      match self.inner.deadline {
        Some(deadline) => {
          tokio::select! {
            biased;
            _ = self.inner.token.cancelled() => {}
            _ = tokio::time::sleep_until(deadline) => {
              self.fire(CancelCause::DeadlineExceeded);
            }
          }
        }
        None => self.inner.token.cancelled().await,
      }
      self.cause().unwrap_or(CancelCause::Cancelled)
    }
    .boxed()
  }
}

impl CancelContext for CancellationToken {
  fn cause(&self) -> Option<CancelCause> {
    CancellationToken::is_cancelled(self).then_some(CancelCause::Cancelled)
  }

  fn cancelled(&self) -> BoxFuture<'_, CancelCause> {
    async move {
      CancellationToken::cancelled(self).await;
      CancelCause::Cancelled
    }
    .boxed()
  }
}
