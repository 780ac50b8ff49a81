//! # Error Handling
//!
//! Error taxonomy for query preparation, row iteration and the cardinality
//! reductions.
//!
//! ## Overview
//!
//! - **Binding**: a parameter value is outside the supported value domain. Raised
//!   before any statement execution.
//! - **Execution**: the driver rejected a prepare, execute, open or advance call.
//!   Resources owned by the failing query are released before the error reaches
//!   the caller.
//! - **Cardinality**: a single-result or optional-result reduction observed the
//!   wrong number of rows.
//! - **NoRow**: `next` was called on a cursor with no row at the current position.
//!
//! Driver implementations report failures as [`DriverError`], a boxed error
//! that converts into [`Error::Execution`] through `?`.

use std::fmt;

/// Boxed error returned by driver implementations.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Row count a reduction expected to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
  /// `single`: exactly one row.
  ExactlyOne,
  /// `optional`: zero or one row.
  AtMostOne,
}

impl fmt::Display for Expected {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expected::ExactlyOne => write!(f, "exactly one row"),
      Expected::AtMostOne => write!(f, "at most one row"),
    }
  }
}

/// Errors surfaced by query handles and row sequences.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A parameter could not be mapped onto a supported value kind.
  #[error("cannot bind parameter {index}: {message}")]
  Binding {
    /// 1-based parameter slot, or 0 when the value was rejected before it had a slot.
    index: usize,
    /// Description of the rejected value.
    message: String,
  },

  /// The underlying client failed.
  #[error("execution failed: {0}")]
  Execution(#[from] DriverError),

  /// A reduction observed a row count outside what it accepts.
  ///
  /// `found` counts the rows observed before the reduction stopped reading,
  /// so a result set with more than one row reports `2`.
  #[error("expected {expected}, found {found}")]
  Cardinality {
    /// Accepted row count.
    expected: Expected,
    /// Rows observed.
    found: usize,
  },

  /// `next` was called with no row available.
  #[error("no row available at the current cursor position")]
  NoRow,
}

impl Error {
  pub(crate) fn binding(index: usize, message: impl Into<String>) -> Self {
    Error::Binding {
      index,
      message: message.into(),
    }
  }

  /// Returns true for [`Error::Cardinality`].
  pub fn is_cardinality(&self) -> bool {
    matches!(self, Error::Cardinality { .. })
  }
}
