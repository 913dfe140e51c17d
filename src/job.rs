use crate::context::CancelContext;
use crate::error::JobError;
use crate::func::{self, Func};
use crate::value::{Args, Value};

use std::fmt;

/// Caller-assigned identifier of a job. Never interpreted by the pool.
pub type JobId = Vec<u8>;

/// One unit of work: an id, a callable, its arguments and, once executed, its result.
#[derive(Clone)]
pub struct Job {
  pub(crate) id: JobId,
  pub(crate) func: Func,
  pub(crate) args: Args,
  pub(crate) result: Option<Vec<Value>>,
}

/// Builds a job. Nothing is validated until the job executes.
pub fn create_job(id: impl Into<JobId>, func: Func, args: impl Into<Args>) -> Job {
  Job {
    id: id.into(),
    func,
    args: args.into(),
    result: None,
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job")
      .field("id", &String::from_utf8_lossy(&self.id))
      .field("args", &self.args)
      .field("result", &self.result)
      .finish_non_exhaustive()
  }
}

impl Job {
  pub fn id(&self) -> &[u8] {
    &self.id
  }

  pub fn args(&self) -> &Args {
    &self.args
  }

  /// All outputs of the callable, in order. `None` until the job has executed.
  pub fn result(&self) -> Option<&[Value]> {
    self.result.as_deref()
  }

  /// The error the callable reported through its error output, if any.
  pub fn invocation_error(&self) -> Option<&str> {
    self.result.as_ref()?.get(1)?.as_error()
  }

  /// Validates the callable against the arguments, then invokes it with `ctx`.
  ///
  /// On success the returned job carries the full result. A validation
  /// failure consumes the job without invoking anything.
  pub fn exec(mut self, ctx: &dyn CancelContext) -> Result<Job, JobError> {
    let args = self.args.clone().into_values();
    let outputs = func::invoke(&*self.func, ctx, args)?;
    self.result = Some(outputs);
    Ok(self)
  }
}
