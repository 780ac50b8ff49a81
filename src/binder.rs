//! Positional parameter binding.

use crate::driver::Statement;
use crate::error::{Error, Result};
use crate::value::{BoundValue, to_bound_values};
use std::any::Any;
use std::io::Cursor as ByteReader;
use tracing::trace;

/// Binds `params` onto `statement`, the first value at slot 1.
///
/// Each variant goes through its own setter: dates, times and timestamps as
/// temporal literals, decimals as exact values, binary content as a stream,
/// enumerated constants through the generic object setter and null as an
/// untyped NULL. A setter failure is reported as [`Error::Execution`].
pub fn bind_parameters<S>(statement: &mut S, params: &[BoundValue]) -> Result<()>
where
  S: Statement + ?Sized,
{
  for (pos, value) in params.iter().enumerate() {
    let index = pos + 1;
    trace!("bind_parameters(index={}, kind={})", index, value.kind());
    bind_one(statement, index, value).map_err(Error::Execution)?;
  }
  Ok(())
}

/// Binds dynamically typed host values.
///
/// Every value is converted before the first setter runs, so an unsupported
/// value leaves the statement untouched and fails with [`Error::Binding`].
pub fn bind_any<S>(statement: &mut S, params: &[&dyn Any]) -> Result<()>
where
  S: Statement + ?Sized,
{
  let values = to_bound_values(params)?;
  bind_parameters(statement, &values)
}

fn bind_one<S>(statement: &mut S, index: usize, value: &BoundValue) -> crate::DriverResult<()>
where
  S: Statement + ?Sized,
{
  match value {
    BoundValue::Null => statement.set_null(index),
    BoundValue::Uuid(v) => statement.set_uuid(index, *v),
    BoundValue::Int(v) => statement.set_int(index, *v),
    BoundValue::Long(v) => statement.set_long(index, *v),
    BoundValue::String(v) => statement.set_string(index, v),
    BoundValue::Double(v) => statement.set_double(index, *v),
    BoundValue::Float(v) => statement.set_float(index, *v),
    BoundValue::Bool(v) => statement.set_bool(index, *v),
    BoundValue::Date(v) => statement.set_date(index, *v),
    BoundValue::Time(v) => statement.set_time(index, *v),
    BoundValue::DateTime(v) => statement.set_timestamp(index, *v),
    BoundValue::Decimal(v) => statement.set_decimal(index, v),
    BoundValue::Binary(v) => statement.set_binary_stream(index, Box::new(ByteReader::new(v.clone()))),
    BoundValue::Enum(v) => statement.set_object(index, v.name()),
  }
}
