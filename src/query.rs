//! # Queries
//!
//! [`Query`] is an inert, re-usable description of a statement: SQL text,
//! positional parameters, a construction mode and where its connection comes
//! from. Every terminal call prepares a fresh [`QueryHandle`] at the moment
//! consumption begins, so a query can be consumed any number of times (for
//! example to retry), each time with its own cursor and its own release.
//!
//! Queries are built through the [`ConnectionExt`] and [`ConnectionSourceExt`]
//! extension traits:
//!
//! ```rust,ignore
//! use rowstream::{ConnectionExt, params};
//!
//! let names: Vec<String> = conn
//!   .select("SELECT name FROM users WHERE active = ?", params![true])
//!   .rows(|row| Ok(row.get_string(0)?))
//!   .collect::<rowstream::Result<_>>()?;
//! ```
//!
//! With a [`ConnectionSource`] the query acquires its own connection on every
//! consumption and releases it together with the statement.

use crate::config::QueryConfig;
use crate::cursor::RowCursor;
use crate::driver::{Connection, ConnectionSource, CursorOf};
use crate::error::Result;
use crate::handle::{QueryHandle, QueryMode, execute_update};
use crate::sequence::{self, RowPublisher, RowStream, Rows};
use crate::value::BoundValue;
use std::fmt;
use tracing::{debug, warn};

/// Builds a `Vec<BoundValue>` from host values.
///
/// ```rust
/// let params = rowstream::params![5, 42i64, "a", None::<i32>];
/// assert_eq!(params.len(), 4);
/// ```
#[macro_export]
macro_rules! params {
  () => {
    ::std::vec::Vec::<$crate::BoundValue>::new()
  };
  ($($value:expr),+ $(,)?) => {
    ::std::vec![$($crate::BoundValue::from($value)),+]
  };
}

enum Origin<'a, C: Connection> {
  Connection(&'a C),
  Source(&'a (dyn ConnectionSource<Connection = C> + 'a)),
}

/// Deferred query over a connection or a connection source.
pub struct Query<'a, C: Connection> {
  origin: Origin<'a, C>,
  mode: QueryMode,
  sql: String,
  params: Vec<BoundValue>,
  config: QueryConfig,
}

impl<C: Connection> fmt::Debug for Query<'_, C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let origin = match self.origin {
      Origin::Connection(_) => "connection",
      Origin::Source(_) => "source",
    };
    f.debug_struct("Query")
      .field("origin", &origin)
      .field("mode", &self.mode)
      .field("sql", &self.sql)
      .field("params", &self.params)
      .field("config", &self.config)
      .finish()
  }
}

impl<'a, C: Connection> Query<'a, C> {
  fn new(origin: Origin<'a, C>, mode: QueryMode, sql: &str, params: Vec<BoundValue>) -> Self {
    Self {
      origin,
      mode,
      sql: sql.to_string(),
      params,
      config: QueryConfig::default(),
    }
  }

  /// Replaces the query configuration.
  pub fn with_config(mut self, config: QueryConfig) -> Self {
    self.config = config;
    self
  }

  /// Sets the name attached to log events.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.config = self.config.with_name(name);
    self
  }

  /// SQL text.
  pub fn sql(&self) -> &str {
    &self.sql
  }

  /// Bound parameters.
  pub fn params(&self) -> &[BoundValue] {
    &self.params
  }

  /// Construction mode.
  pub fn mode(&self) -> QueryMode {
    self.mode
  }

  /// Prepares a handle now: acquires a connection if the query has a source,
  /// prepares, binds and, for inserts, executes.
  pub fn prepare(&self) -> Result<QueryHandle<C>> {
    let Self {
      sql,
      params,
      config,
      ..
    } = self;
    match (&self.origin, self.mode) {
      (Origin::Connection(connection), QueryMode::Select) => {
        QueryHandle::select(*connection, sql, params, config)
      }
      (Origin::Connection(connection), QueryMode::Insert) => {
        QueryHandle::insert(*connection, sql, params, config)
      }
      (Origin::Source(source), QueryMode::Select) => {
        debug!(query = %config.name(), "acquiring connection");
        QueryHandle::select_owned(source.acquire()?, sql, params, config)
      }
      (Origin::Source(source), QueryMode::Insert) => {
        debug!(query = %config.name(), "acquiring connection");
        QueryHandle::insert_owned(source.acquire()?, sql, params, config)
      }
    }
  }

  /// Prepares and opens the cursor now.
  pub fn open<F, T>(&self, mapper: F) -> Result<RowCursor<C, F, T>>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    RowCursor::open(self.prepare()?, mapper)
  }

  /// Blocking iterator; prepares and opens on the first `next`.
  pub fn rows<F, T>(&self, mapper: F) -> Rows<C, impl FnOnce() -> Result<QueryHandle<C>>, F, T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    Rows::new(move || self.prepare(), mapper)
  }

  /// Demand-driven stream; prepares and opens on the first poll.
  pub fn stream<F, T>(
    &self,
    mapper: F,
  ) -> RowStream<C, impl FnOnce() -> Result<QueryHandle<C>>, F, T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    RowStream::new(move || self.prepare(), mapper)
  }

  /// Push publisher; prepares and opens on subscribe.
  pub fn publisher<F, T>(
    &self,
    mapper: F,
  ) -> RowPublisher<C, impl FnOnce() -> Result<QueryHandle<C>>, F, T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    RowPublisher::new(move || self.prepare(), mapper)
  }

  /// Reads exactly one row.
  pub fn single<F, T>(&self, mapper: F) -> Result<T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    sequence::single(self.rows(mapper))
  }

  /// Reads zero or one row.
  pub fn optional<F, T>(&self, mapper: F) -> Result<Option<T>>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    sequence::optional(self.rows(mapper))
  }

  /// Future resolving to exactly one row. Nothing runs until it is polled.
  pub async fn fetch_one<F, T>(&self, mapper: F) -> Result<T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    sequence::fetch_one(self.stream(mapper)).await
  }

  /// Future resolving to zero or one row. Nothing runs until it is polled.
  pub async fn fetch_optional<F, T>(&self, mapper: F) -> Result<Option<T>>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    sequence::fetch_optional(self.stream(mapper)).await
  }
}

/// Query entry points on a caller-owned connection.
pub trait ConnectionExt: Connection + Sized {
  /// Deferred select. The connection stays open after consumption.
  fn select(&self, sql: &str, params: Vec<BoundValue>) -> Query<'_, Self> {
    Query::new(Origin::Connection(self), QueryMode::Select, sql, params)
  }

  /// Deferred insert. The insert executes when a handle is prepared, which
  /// happens once per consumption.
  fn insert(&self, sql: &str, params: Vec<BoundValue>) -> Query<'_, Self> {
    Query::new(Origin::Connection(self), QueryMode::Insert, sql, params)
  }

  /// Executes a data-modifying statement and returns the affected row count.
  fn execute(&self, sql: &str, params: Vec<BoundValue>) -> Result<u64> {
    execute_update(self, sql, &params, &QueryConfig::default())
  }
}

impl<C: Connection> ConnectionExt for C {}

/// Query entry points on a connection source. Each consumption acquires its own
/// connection, which is released with the statement.
pub trait ConnectionSourceExt: ConnectionSource + Sized {
  /// Deferred select on a freshly acquired connection.
  fn select(&self, sql: &str, params: Vec<BoundValue>) -> Query<'_, Self::Connection> {
    Query::new(Origin::Source(self), QueryMode::Select, sql, params)
  }

  /// Deferred insert on a freshly acquired connection.
  fn insert(&self, sql: &str, params: Vec<BoundValue>) -> Query<'_, Self::Connection> {
    Query::new(Origin::Source(self), QueryMode::Insert, sql, params)
  }

  /// Acquires a connection, executes a data-modifying statement and closes the
  /// connection, returning the affected row count.
  fn execute(&self, sql: &str, params: Vec<BoundValue>) -> Result<u64> {
    let config = QueryConfig::default();
    let mut connection = self.acquire()?;
    let result = execute_update(&connection, sql, &params, &config);
    if let Err(e) = connection.close() {
      warn!(query = %config.name(), error = %e, "failed to close connection");
    }
    result
  }
}

impl<S: ConnectionSource> ConnectionSourceExt for S {}
