//! # Driver Boundary
//!
//! Traits describing the blocking, cursor-style client this crate adapts.
//!
//! A driver provides a [`ConnectionSource`] (pool or direct connector), a
//! [`Connection`] that prepares statements, a [`Statement`] with one typed
//! setter per [`BoundValue`](crate::BoundValue) kind, and a [`Cursor`] that
//! only knows how to advance and close. Column access is driver specific: row
//! mappers receive the driver's concrete cursor type and call its own accessors.
//!
//! Every call here may block. The adapters invoke them inline, on whichever
//! thread or task is consuming rows.

use crate::error::DriverResult;
use crate::value::Decimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::io::Read;
use std::time::Duration;
use uuid::Uuid;

/// Forward-only result cursor.
pub trait Cursor {
  /// Moves to the next row, returning `false` once the result set is exhausted.
  fn advance(&mut self) -> DriverResult<bool>;

  /// Closes the cursor. Closing an already-closed cursor must succeed.
  fn close(&mut self) -> DriverResult<()>;
}

/// Prepared statement with positional (1-based) parameters.
pub trait Statement {
  /// Cursor type produced by queries and generated-key retrieval.
  type Cursor: Cursor;

  /// Binds SQL NULL without a declared type.
  fn set_null(&mut self, index: usize) -> DriverResult<()>;
  /// Binds a UUID as a generic object.
  fn set_uuid(&mut self, index: usize, value: Uuid) -> DriverResult<()>;
  /// Binds a 32-bit integer.
  fn set_int(&mut self, index: usize, value: i32) -> DriverResult<()>;
  /// Binds a 64-bit integer.
  fn set_long(&mut self, index: usize, value: i64) -> DriverResult<()>;
  /// Binds a string.
  fn set_string(&mut self, index: usize, value: &str) -> DriverResult<()>;
  /// Binds a double.
  fn set_double(&mut self, index: usize, value: f64) -> DriverResult<()>;
  /// Binds a float.
  fn set_float(&mut self, index: usize, value: f32) -> DriverResult<()>;
  /// Binds a boolean.
  fn set_bool(&mut self, index: usize, value: bool) -> DriverResult<()>;
  /// Binds a DATE literal.
  fn set_date(&mut self, index: usize, value: NaiveDate) -> DriverResult<()>;
  /// Binds a TIME literal.
  fn set_time(&mut self, index: usize, value: NaiveTime) -> DriverResult<()>;
  /// Binds a TIMESTAMP literal.
  fn set_timestamp(&mut self, index: usize, value: NaiveDateTime) -> DriverResult<()>;
  /// Binds an exact-precision decimal.
  fn set_decimal(&mut self, index: usize, value: &Decimal) -> DriverResult<()>;
  /// Binds a binary value read from `reader`.
  fn set_binary_stream(&mut self, index: usize, reader: Box<dyn Read + Send>)
  -> DriverResult<()>;
  /// Binds an enumerated constant by name through the generic object setter.
  fn set_object(&mut self, index: usize, name: &str) -> DriverResult<()>;

  /// Fetch size hint. Drivers without one ignore it.
  fn set_fetch_size(&mut self, _rows: u32) -> DriverResult<()> {
    Ok(())
  }

  /// Statement timeout. Drivers without one ignore it.
  fn set_query_timeout(&mut self, _timeout: Duration) -> DriverResult<()> {
    Ok(())
  }

  /// Executes a data-modifying statement, returning the affected row count.
  fn execute_update(&mut self) -> DriverResult<u64>;

  /// Executes a query and opens its result cursor.
  fn execute_query(&mut self) -> DriverResult<Self::Cursor>;

  /// Opens a cursor over the keys generated by the last `execute_update`.
  ///
  /// Only meaningful on statements prepared with
  /// [`Connection::prepare_returning_keys`].
  fn generated_keys(&mut self) -> DriverResult<Self::Cursor>;

  /// Closes the statement. Closing an already-closed statement must succeed.
  fn close(&mut self) -> DriverResult<()>;
}

/// Open database connection.
pub trait Connection {
  /// Statement type prepared by this connection.
  type Statement: Statement;

  /// Prepares `sql`.
  fn prepare(&self, sql: &str) -> DriverResult<Self::Statement>;

  /// Prepares `sql`, requesting generated-key retrieval after execution.
  fn prepare_returning_keys(&self, sql: &str) -> DriverResult<Self::Statement>;

  /// Closes (or returns to its pool) the connection.
  fn close(&mut self) -> DriverResult<()>;
}

/// Source of connections, such as a pool or a direct connector.
pub trait ConnectionSource {
  /// Connection type handed out.
  type Connection: Connection;

  /// Acquires a connection. The caller becomes responsible for closing it.
  fn acquire(&self) -> DriverResult<Self::Connection>;
}

/// Cursor type produced by connection `C`.
pub type CursorOf<C> = <<C as Connection>::Statement as Statement>::Cursor;

/// Statement type produced by connection `C`.
pub type StatementOf<C> = <C as Connection>::Statement;
