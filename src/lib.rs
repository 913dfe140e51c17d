//! A Tokio-based fixed-size job pool: submit typed jobs once, run a fixed
//! number of workers over them, and drain result envelopes as they complete,
//! with a shared context for cooperative cancellation.

mod context;
mod envelope;
mod error;
mod func;
mod handle;
mod job;
mod pool;
mod queue;
mod value;
mod worker;

pub use context::{CancelCause, CancelContext, Context};
pub use envelope::{Envelope, EnvelopeKind};
pub use error::{JobError, PoolError, ValidationError};
pub use func::{func1, func2, invoke, raw, validate, Callable, Func, Signature};
pub use handle::{DoneSignal, ResultStream};
pub use job::{create_job, Job, JobId};
pub use pool::{JobPool, PoolState};
pub use value::{Args, FromValue, IntoValue, Kind, Value};
