use crate::value::Kind;

use thiserror::Error;

/// Errors returned at the call site that misused the `job_pool` API.
///
/// Per-job failures never show up here; they travel through the results
/// stream as [`Envelope`](crate::Envelope) data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Pool requires at least one worker, got {0}")]
  ZeroWorkers(usize),

  #[error("Jobs were already submitted to this pool; the queue is closed")]
  AlreadySubmitted,

  #[error("Pool was already run; a pool can be run exactly once")]
  AlreadyRunning,

  #[error("Job queue has no remaining workers to receive jobs: {0}")]
  QueueClosed(String),
}

/// A callable whose shape does not match the `(ctx, args...) -> (value, error)`
/// calling convention. The callable is never invoked when this is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  #[error("Callable takes {expected} argument(s) after the context, job supplies {got}")]
  ArityMismatch { expected: usize, got: usize },

  #[error("First parameter of the callable must be the cancellation context, found {found}")]
  MissingContext { found: Kind },

  #[error("Callable must return exactly 2 outputs (value, error), declares {got}")]
  OutputCount { got: usize },

  #[error("Second output of the callable must be an error, declares {found}")]
  ErrorOutput { found: Kind },

  #[error("Argument {index} has kind {got}, callable expects {expected}")]
  ArgumentKind { index: usize, expected: Kind, got: Kind },

  #[error("Argument {index} has the right kind but cannot be read as the callable's {expected} parameter")]
  ArgumentValue { index: usize, expected: Kind },
}

/// Why a single job produced no result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
  #[error("Callable rejected before invocation: {0}")]
  Validation(#[from] ValidationError),

  #[error("Callable returned {got} value(s) but declares {expected}")]
  MalformedOutput { expected: usize, got: usize },

  #[error("Callable returned {found} in its error slot; expected nil or an error")]
  MalformedErrorSlot { found: Kind },

  #[error("Callable panicked during execution")]
  Panicked,

  #[error("Callable was aborted before finishing (runtime shutting down)")]
  Aborted,
}
