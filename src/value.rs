//! # Parameter Values
//!
//! [`BoundValue`] is the closed set of host values that can be bound as query
//! parameters. Each variant maps onto exactly one [`Statement`](crate::Statement)
//! setter (see [`bind_parameters`](crate::bind_parameters)).
//!
//! Values are built with `From` conversions for statically typed callers,
//! [`BoundValue::from_any`] for dynamically typed ones, or
//! `TryFrom<serde_json::Value>` for JSON-sourced parameters. The dynamic paths
//! reject anything outside the supported set with [`Error::Binding`] instead of
//! binding it as null or an opaque object.

use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Arbitrary-precision decimal stored as an unscaled integer and a scale.
///
/// `Decimal::new(12345, 2)` is `123.45`. The value is passed to drivers as is;
/// no rounding happens in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
  unscaled: i128,
  scale: u32,
}

impl Decimal {
  /// Creates `unscaled * 10^-scale`.
  pub fn new(unscaled: i128, scale: u32) -> Self {
    Self { unscaled, scale }
  }

  /// Unscaled integer value.
  pub fn unscaled(&self) -> i128 {
    self.unscaled
  }

  /// Number of digits after the decimal point.
  pub fn scale(&self) -> u32 {
    self.scale
  }
}

impl fmt::Display for Decimal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let digits = self.unscaled.unsigned_abs().to_string();
    let sign = if self.unscaled < 0 { "-" } else { "" };
    let scale = self.scale as usize;
    if scale == 0 {
      return write!(f, "{}{}", sign, digits);
    }
    let padded = format!("{:0>width$}", digits, width = scale + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - scale);
    write!(f, "{}{}.{}", sign, int_part, frac_part)
  }
}

impl FromStr for Decimal {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let invalid = || Error::binding(0, format!("invalid decimal literal {:?}", s));
    let (negative, body) = match s.strip_prefix('-') {
      Some(rest) => (true, rest),
      None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
      return Err(invalid());
    }
    if !int_part
      .chars()
      .chain(frac_part.chars())
      .all(|c| c.is_ascii_digit())
    {
      return Err(invalid());
    }
    let digits = format!("{}{}", int_part, frac_part);
    let magnitude: i128 = digits.parse().map_err(|_| invalid())?;
    let unscaled = if negative { -magnitude } else { magnitude };
    Ok(Decimal::new(unscaled, frac_part.len() as u32))
  }
}

/// Named constant of a host enumeration, bound through the generic object setter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumConstant(String);

impl EnumConstant {
  /// Creates a constant from its name.
  pub fn new(name: impl Into<String>) -> Self {
    Self(name.into())
  }

  /// Creates a constant from a value's `Debug` name, which for fieldless enums is
  /// the variant name.
  pub fn of<E: fmt::Debug>(value: &E) -> Self {
    Self(format!("{:?}", value))
  }

  /// Constant name.
  pub fn name(&self) -> &str {
    &self.0
  }
}

/// A query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
  /// SQL NULL of unspecified type.
  Null,
  /// UUID.
  Uuid(Uuid),
  /// 32-bit integer.
  Int(i32),
  /// 64-bit integer.
  Long(i64),
  /// Text.
  String(String),
  /// Double-precision float.
  Double(f64),
  /// Single-precision float.
  Float(f32),
  /// Boolean.
  Bool(bool),
  /// Calendar date.
  Date(NaiveDate),
  /// Time of day.
  Time(NaiveTime),
  /// Date and time without zone.
  DateTime(NaiveDateTime),
  /// Exact decimal.
  Decimal(Decimal),
  /// Binary content, bound as a stream.
  Binary(Bytes),
  /// Enumerated constant.
  Enum(EnumConstant),
}

impl BoundValue {
  /// Binds an enumeration value by variant name.
  pub fn enumerated<E: fmt::Debug>(value: &E) -> Self {
    BoundValue::Enum(EnumConstant::of(value))
  }

  /// Short name of the variant, used in logs and error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      BoundValue::Null => "null",
      BoundValue::Uuid(_) => "uuid",
      BoundValue::Int(_) => "int",
      BoundValue::Long(_) => "long",
      BoundValue::String(_) => "string",
      BoundValue::Double(_) => "double",
      BoundValue::Float(_) => "float",
      BoundValue::Bool(_) => "bool",
      BoundValue::Date(_) => "date",
      BoundValue::Time(_) => "time",
      BoundValue::DateTime(_) => "datetime",
      BoundValue::Decimal(_) => "decimal",
      BoundValue::Binary(_) => "binary",
      BoundValue::Enum(_) => "enum",
    }
  }

  /// Converts a dynamically typed host value.
  ///
  /// Accepts the types listed on [`BoundValue`]'s `From` impls, their `Option`
  /// forms, `&'static str`, `Vec<u8>`, `()` as null, and `BoundValue` itself.
  /// Anything else fails with [`Error::Binding`].
  pub fn from_any(value: &dyn Any) -> Result<Self> {
    Self::from_any_at(0, value)
  }

  pub(crate) fn from_any_at(index: usize, value: &dyn Any) -> Result<Self> {
    if value.is::<()>() {
      return Ok(BoundValue::Null);
    }
    if let Some(v) = value.downcast_ref::<BoundValue>() {
      return Ok(v.clone());
    }
    if let Some(v) = value.downcast_ref::<&'static str>() {
      return Ok(BoundValue::String((*v).to_string()));
    }

    macro_rules! downcast {
      ($($ty:ty),* $(,)?) => {
        $(
          if let Some(v) = value.downcast_ref::<$ty>() {
            return Ok(BoundValue::from(v.clone()));
          }
          if let Some(v) = value.downcast_ref::<Option<$ty>>() {
            return Ok(BoundValue::from(v.clone()));
          }
        )*
      };
    }

    downcast!(
      Uuid,
      i32,
      i64,
      String,
      f64,
      f32,
      bool,
      NaiveDate,
      NaiveTime,
      NaiveDateTime,
      Decimal,
      Bytes,
      Vec<u8>,
      EnumConstant,
    );

    Err(Error::binding(
      index,
      "unsupported parameter type; expected one of null, uuid, int, long, string, \
       double, float, bool, date, time, datetime, decimal, binary or enum",
    ))
  }
}

/// Converts a positional list of dynamically typed values, failing on the first
/// unsupported one.
pub fn to_bound_values(values: &[&dyn Any]) -> Result<Vec<BoundValue>> {
  values
    .iter()
    .enumerate()
    .map(|(pos, v)| BoundValue::from_any_at(pos + 1, *v))
    .collect()
}

macro_rules! impl_from {
  ($($ty:ty => $variant:ident),* $(,)?) => {
    $(
      impl From<$ty> for BoundValue {
        fn from(v: $ty) -> Self {
          BoundValue::$variant(v)
        }
      }
    )*
  };
}

impl_from!(
  Uuid => Uuid,
  i32 => Int,
  i64 => Long,
  String => String,
  f64 => Double,
  f32 => Float,
  bool => Bool,
  NaiveDate => Date,
  NaiveTime => Time,
  NaiveDateTime => DateTime,
  Decimal => Decimal,
  Bytes => Binary,
  EnumConstant => Enum,
);

impl From<&str> for BoundValue {
  fn from(v: &str) -> Self {
    BoundValue::String(v.to_string())
  }
}

impl From<Vec<u8>> for BoundValue {
  fn from(v: Vec<u8>) -> Self {
    BoundValue::Binary(Bytes::from(v))
  }
}

impl<T: Into<BoundValue>> From<Option<T>> for BoundValue {
  fn from(v: Option<T>) -> Self {
    v.map_or(BoundValue::Null, Into::into)
  }
}

impl TryFrom<serde_json::Value> for BoundValue {
  type Error = Error;

  fn try_from(value: serde_json::Value) -> Result<Self> {
    match value {
      serde_json::Value::Null => Ok(BoundValue::Null),
      serde_json::Value::Bool(b) => Ok(BoundValue::Bool(b)),
      serde_json::Value::Number(n) => {
        if let Some(i) = n.as_i64() {
          Ok(BoundValue::Long(i))
        } else if n.is_u64() {
          Err(Error::binding(0, format!("integer {} exceeds i64", n)))
        } else if let Some(f) = n.as_f64() {
          Ok(BoundValue::Double(f))
        } else {
          Err(Error::binding(0, format!("unsupported number {}", n)))
        }
      }
      serde_json::Value::String(s) => Ok(BoundValue::String(s)),
      serde_json::Value::Array(_) => Err(Error::binding(0, "JSON arrays cannot be bound")),
      serde_json::Value::Object(_) => Err(Error::binding(0, "JSON objects cannot be bound")),
    }
  }
}
