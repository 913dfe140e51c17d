//! Callables accepted by the pool, and the invoker that checks their shape
//! before calling them.
//!
//! Every callable follows one convention: a leading cancellation context, the
//! job's positional arguments, and exactly two outputs, a value followed by an
//! error. Typed closures built with [`func1`] / [`func2`] satisfy it by
//! construction; [`raw`] callables declare their shape and are checked against
//! the job's arguments at execution time.

use crate::context::CancelContext;
use crate::error::{JobError, ValidationError};
use crate::value::{FromValue, IntoValue, Kind, Value};

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Declared parameter and output kinds of a callable.
/// `inputs` includes the leading [`Kind::Context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
  pub inputs: Vec<Kind>,
  pub outputs: Vec<Kind>,
}

impl Signature {
  /// A conforming signature: `(ctx, params...) -> (output, error)`.
  pub fn conventional(params: impl IntoIterator<Item = Kind>, output: Kind) -> Self {
    let mut inputs = vec![Kind::Context];
    inputs.extend(params);
    Self {
      inputs,
      outputs: vec![output, Kind::Error],
    }
  }
}

/// Executable logic whose shape is discovered through [`Callable::signature`].
pub trait Callable: Send + Sync {
  fn signature(&self) -> Signature;

  /// Invokes the callable. Only called after the signature has been validated
  /// against `args`. Returns `Err` without running any user code when an
  /// argument cannot be converted to the declared parameter type.
  fn call(&self, ctx: &dyn CancelContext, args: Vec<Value>) -> Result<Vec<Value>, JobError>;
}

/// A shared, type-erased callable.
pub type Func = Arc<dyn Callable>;

/// Checks `signature` against the kinds of the job's arguments.
pub fn validate(signature: &Signature, args: &[Kind]) -> Result<(), ValidationError> {
  if signature.inputs.len() != args.len() + 1 {
    return Err(ValidationError::ArityMismatch {
      expected: signature.inputs.len().saturating_sub(1),
      got: args.len(),
    });
  }
  if signature.inputs[0] != Kind::Context {
    return Err(ValidationError::MissingContext {
      found: signature.inputs[0],
    });
  }
  if signature.outputs.len() != 2 {
    return Err(ValidationError::OutputCount {
      got: signature.outputs.len(),
    });
  }
  if signature.outputs[1] != Kind::Error {
    return Err(ValidationError::ErrorOutput {
      found: signature.outputs[1],
    });
  }
  for (index, (expected, got)) in signature.inputs[1..].iter().zip(args).enumerate() {
    if !expected.accepts(*got) {
      return Err(ValidationError::ArgumentKind {
        index,
        expected: *expected,
        got: *got,
      });
    }
  }
  Ok(())
}

/// Validates and invokes `func`, returning all of its outputs in order.
///
/// The result is either complete or absent: a callable that returns a
/// different number of values than it declared is reported as
/// [`JobError::MalformedOutput`], and one whose error slot holds anything but
/// nil or an error as [`JobError::MalformedErrorSlot`].
pub fn invoke(func: &dyn Callable, ctx: &dyn CancelContext, args: Vec<Value>) -> Result<Vec<Value>, JobError> {
  let signature = func.signature();
  let kinds: Vec<Kind> = args.iter().map(Value::kind).collect();
  validate(&signature, &kinds)?;

  let outputs = func.call(ctx, args)?;
  if outputs.len() != signature.outputs.len() {
    return Err(JobError::MalformedOutput {
      expected: signature.outputs.len(),
      got: outputs.len(),
    });
  }
  match outputs[1].kind() {
    Kind::Nil | Kind::Error => Ok(outputs),
    found => Err(JobError::MalformedErrorSlot { found }),
  }
}

fn normalize<T: IntoValue, E: fmt::Display>(outcome: Result<T, E>) -> Vec<Value> {
  match outcome {
    Ok(value) => vec![value.into_value(), Value::Nil],
    Err(e) => vec![Value::Nil, Value::Error(e.to_string())],
  }
}

fn conversion_error(index: usize, expected: Kind) -> JobError {
  JobError::Validation(ValidationError::ArgumentValue { index, expected })
}

struct Fn1<F, A, T, E> {
  f: F,
  _marker: PhantomData<fn(A) -> Result<T, E>>,
}

impl<F, A, T, E> Callable for Fn1<F, A, T, E>
where
  F: Fn(&dyn CancelContext, A) -> Result<T, E> + Send + Sync,
  A: FromValue,
  T: IntoValue,
  E: fmt::Display,
{
  fn signature(&self) -> Signature {
    Signature::conventional([A::KIND], T::KIND)
  }

  fn call(&self, ctx: &dyn CancelContext, args: Vec<Value>) -> Result<Vec<Value>, JobError> {
    let mut args = args.into_iter();
    let a = args.next().and_then(A::from_value).ok_or_else(|| conversion_error(0, A::KIND))?;
    Ok(normalize((self.f)(ctx, a)))
  }
}

struct Fn2<F, A, B, T, E> {
  f: F,
  _marker: PhantomData<fn(A, B) -> Result<T, E>>,
}

impl<F, A, B, T, E> Callable for Fn2<F, A, B, T, E>
where
  F: Fn(&dyn CancelContext, A, B) -> Result<T, E> + Send + Sync,
  A: FromValue,
  B: FromValue,
  T: IntoValue,
  E: fmt::Display,
{
  fn signature(&self) -> Signature {
    Signature::conventional([A::KIND, B::KIND], T::KIND)
  }

  fn call(&self, ctx: &dyn CancelContext, args: Vec<Value>) -> Result<Vec<Value>, JobError> {
    let mut args = args.into_iter();
    let a = args.next().and_then(A::from_value).ok_or_else(|| conversion_error(0, A::KIND))?;
    let b = args.next().and_then(B::from_value).ok_or_else(|| conversion_error(1, B::KIND))?;
    Ok(normalize((self.f)(ctx, a, b)))
  }
}

struct RawFn<F> {
  signature: Signature,
  f: F,
}

impl<F> Callable for RawFn<F>
where
  F: Fn(&dyn CancelContext, Vec<Value>) -> Vec<Value> + Send + Sync,
{
  fn signature(&self) -> Signature {
    self.signature.clone()
  }

  fn call(&self, ctx: &dyn CancelContext, args: Vec<Value>) -> Result<Vec<Value>, JobError> {
    Ok((self.f)(ctx, args))
  }
}

/// Wraps `f(ctx, a) -> Result<T, E>` as a callable taking one argument.
pub fn func1<F, A, T, E>(f: F) -> Func
where
  F: Fn(&dyn CancelContext, A) -> Result<T, E> + Send + Sync + 'static,
  A: FromValue + 'static,
  T: IntoValue + 'static,
  E: fmt::Display + 'static,
{
  Arc::new(Fn1 {
    f,
    _marker: PhantomData,
  })
}

/// Wraps `f(ctx, a, b) -> Result<T, E>` as a callable taking two arguments.
pub fn func2<F, A, B, T, E>(f: F) -> Func
where
  F: Fn(&dyn CancelContext, A, B) -> Result<T, E> + Send + Sync + 'static,
  A: FromValue + 'static,
  B: FromValue + 'static,
  T: IntoValue + 'static,
  E: fmt::Display + 'static,
{
  Arc::new(Fn2 {
    f,
    _marker: PhantomData,
  })
}

/// Wraps a callable of arbitrary declared shape. Nothing about `signature` is
/// checked here; a non-conforming one is rejected when a job executes it.
pub fn raw<F>(signature: Signature, f: F) -> Func
where
  F: Fn(&dyn CancelContext, Vec<Value>) -> Vec<Value> + Send + Sync + 'static,
{
  Arc::new(RawFn { signature, f })
}
