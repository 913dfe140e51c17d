use crate::context::CancelCause;
use crate::error::JobError;
use crate::job::JobId;
use crate::value::Value;

/// What a worker publishes on the results stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
  /// The callable ran. `result` holds every output in order; an error the
  /// callable reported sits in its second slot.
  Completed { id: JobId, result: Vec<Value> },
  /// The job produced no result: its callable was malformed, returned a
  /// malformed result, panicked or was aborted.
  Failed { id: JobId, error: JobError },
  /// A worker observed cancellation and stopped. Carries no job.
  Cancelled { cause: CancelCause },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
  Completed,
  /// Rejected before the callable ran.
  ValidationFailed,
  /// The callable ran but its outputs broke the `(value, error)` convention.
  MalformedOutput,
  Panicked,
  Aborted,
  Cancelled,
}

impl From<&Envelope> for EnvelopeKind {
  fn from(envelope: &Envelope) -> Self {
    match envelope {
      Envelope::Completed { .. } => EnvelopeKind::Completed,
      Envelope::Failed { error, .. } => match error {
        JobError::Validation(_) => EnvelopeKind::ValidationFailed,
        JobError::MalformedOutput { .. } | JobError::MalformedErrorSlot { .. } => EnvelopeKind::MalformedOutput,
        JobError::Panicked => EnvelopeKind::Panicked,
        JobError::Aborted => EnvelopeKind::Aborted,
      },
      Envelope::Cancelled { .. } => EnvelopeKind::Cancelled,
    }
  }
}

impl Envelope {
  pub fn kind(&self) -> EnvelopeKind {
    EnvelopeKind::from(self)
  }

  /// The job id, for envelopes that belong to a job.
  pub fn id(&self) -> Option<&[u8]> {
    match self {
      Envelope::Completed { id, .. } | Envelope::Failed { id, .. } => Some(id),
      Envelope::Cancelled { .. } => None,
    }
  }

  pub fn result(&self) -> Option<&[Value]> {
    match self {
      Envelope::Completed { result, .. } => Some(result),
      _ => None,
    }
  }

  /// The error the callable itself returned, if it ran and reported one.
  pub fn invocation_error(&self) -> Option<&str> {
    self.result()?.get(1)?.as_error()
  }

  pub fn cancel_cause(&self) -> Option<CancelCause> {
    match self {
      Envelope::Cancelled { cause } => Some(*cause),
      _ => None,
    }
  }
}
