//! Payload types carried by jobs: arguments in, results out.

use std::fmt;

/// A single argument or output value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Nil,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  Bytes(Vec<u8>),
  List(Vec<Value>),
  /// An error reported by a callable through its error output.
  Error(String),
}

/// The shape of a [`Value`], used to describe callable parameters and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
  /// Matches any value. Used by callables that inspect their input themselves.
  Any,
  Nil,
  Bool,
  Int,
  Float,
  Str,
  Bytes,
  List,
  Error,
  /// The leading cancellation-context parameter. Never carried by a `Value`.
  Context,
}

impl Kind {
  /// Returns `true` if a value of kind `other` may be passed where `self` is declared.
  pub fn accepts(self, other: Kind) -> bool {
    self == Kind::Any || self == other
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Kind::Any => "any",
      Kind::Nil => "nil",
      Kind::Bool => "bool",
      Kind::Int => "int",
      Kind::Float => "float",
      Kind::Str => "str",
      Kind::Bytes => "bytes",
      Kind::List => "list",
      Kind::Error => "error",
      Kind::Context => "context",
    };
    f.write_str(name)
  }
}

impl Value {
  pub fn kind(&self) -> Kind {
    match self {
      Value::Nil => Kind::Nil,
      Value::Bool(_) => Kind::Bool,
      Value::Int(_) => Kind::Int,
      Value::Float(_) => Kind::Float,
      Value::Str(_) => Kind::Str,
      Value::Bytes(_) => Kind::Bytes,
      Value::List(_) => Kind::List,
      Value::Error(_) => Kind::Error,
    }
  }

  pub fn is_nil(&self) -> bool {
    matches!(self, Value::Nil)
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_error(&self) -> Option<&str> {
    match self {
      Value::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Conversion of a Rust value into a [`Value`] with a statically known kind.
pub trait IntoValue {
  const KIND: Kind;
  fn into_value(self) -> Value;
}

/// Conversion of a [`Value`] back into a Rust value.
/// Returns `None` when the value has a different kind.
pub trait FromValue: Sized {
  const KIND: Kind;
  fn from_value(value: Value) -> Option<Self>;
}

macro_rules! scalar_value {
  ($ty:ty, $variant:ident) => {
    impl IntoValue for $ty {
      const KIND: Kind = Kind::$variant;
      fn into_value(self) -> Value {
        Value::$variant(self.into())
      }
    }

    impl FromValue for $ty {
      const KIND: Kind = Kind::$variant;
      fn from_value(value: Value) -> Option<Self> {
        match value {
          Value::$variant(v) => v.try_into().ok(),
          _ => None,
        }
      }
    }

    impl From<$ty> for Value {
      fn from(v: $ty) -> Self {
        v.into_value()
      }
    }
  };
}

scalar_value!(bool, Bool);
scalar_value!(i64, Int);
scalar_value!(i32, Int);
scalar_value!(u32, Int);
scalar_value!(f64, Float);
scalar_value!(String, Str);
scalar_value!(Vec<u8>, Bytes);

impl IntoValue for &str {
  const KIND: Kind = Kind::Str;
  fn into_value(self) -> Value {
    Value::Str(self.to_string())
  }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self {
    v.into_value()
  }
}

impl IntoValue for () {
  const KIND: Kind = Kind::Nil;
  fn into_value(self) -> Value {
    Value::Nil
  }
}

impl FromValue for () {
  const KIND: Kind = Kind::Nil;
  fn from_value(value: Value) -> Option<Self> {
    value.is_nil().then_some(())
  }
}

impl IntoValue for Value {
  const KIND: Kind = Kind::Any;
  fn into_value(self) -> Value {
    self
  }
}

impl FromValue for Value {
  const KIND: Kind = Kind::Any;
  fn from_value(value: Value) -> Option<Self> {
    Some(value)
  }
}

/// The arguments of a job: either one value, or a sequence spread positionally
/// over the callable's parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Args {
  One(Value),
  Many(Vec<Value>),
}

impl Args {
  pub fn one(value: impl Into<Value>) -> Self {
    Args::One(value.into())
  }

  pub fn many<I, V>(values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    Args::Many(values.into_iter().map(Into::into).collect())
  }

  pub fn len(&self) -> usize {
    match self {
      Args::One(_) => 1,
      Args::Many(values) => values.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Kinds of each positional argument, in order.
  pub fn kinds(&self) -> Vec<Kind> {
    match self {
      Args::One(v) => vec![v.kind()],
      Args::Many(values) => values.iter().map(Value::kind).collect(),
    }
  }

  pub fn into_values(self) -> Vec<Value> {
    match self {
      Args::One(v) => vec![v],
      Args::Many(values) => values,
    }
  }
}

macro_rules! single_arg {
  ($($ty:ty),*) => {
    $(
      impl From<$ty> for Args {
        fn from(v: $ty) -> Self {
          Args::One(v.into())
        }
      }
    )*
  };
}

single_arg!(Value, bool, i64, i32, u32, f64, String, &str, Vec<u8>);

impl From<Vec<Value>> for Args {
  fn from(values: Vec<Value>) -> Self {
    Args::Many(values)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_single_argument_is_one_element_list() {
    let args = Args::from(7i64);
    assert_eq!(args.len(), 1);
    assert_eq!(args.kinds(), vec![Kind::Int]);
    assert_eq!(args.into_values(), vec![Value::Int(7)]);
  }

  #[test]
  fn test_many_arguments_keep_positions() {
    let args = Args::many([Value::from(1i64), Value::from("two"), Value::Bool(true)]);
    assert_eq!(args.kinds(), vec![Kind::Int, Kind::Str, Kind::Bool]);
    assert!(Args::from(Vec::<Value>::new()).is_empty());
  }

  #[test]
  fn test_from_value_rejects_other_kinds() {
    assert_eq!(i64::from_value(Value::Int(3)), Some(3));
    assert_eq!(i64::from_value(Value::Str("3".into())), None);
    assert_eq!(u32::from_value(Value::Int(-1)), None);
    assert_eq!(<()>::from_value(Value::Nil), Some(()));
  }

  #[test]
  fn test_any_accepts_every_kind() {
    assert!(Kind::Any.accepts(Kind::Bytes));
    assert!(Kind::Int.accepts(Kind::Int));
    assert!(!Kind::Int.accepts(Kind::Float));
  }
}
