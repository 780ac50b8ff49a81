//! # Query Handles
//!
//! A [`QueryHandle`] is a prepared, bound statement together with a deferred
//! operation that opens its result cursor. Building one does the statement work
//! that must happen exactly once (prepare, bind and, for inserts, execute) and
//! stops there: no cursor exists until a terminal adapter starts consuming.
//!
//! ## Construction modes
//!
//! - [`QueryHandle::select`] / [`QueryHandle::insert`]: the connection belongs to
//!   the caller. The handle owns only the statement.
//! - [`QueryHandle::select_owned`] / [`QueryHandle::insert_owned`]: the handle
//!   owns the connection as well and closes it on release.
//!
//! Construction is all-or-nothing. If binding or the eager insert execution
//! fails, the statement and any owned connection are closed before the error is
//! returned.
//!
//! Dropping a handle that was never consumed closes whatever it owns.

use crate::binder::bind_parameters;
use crate::config::QueryConfig;
use crate::driver::{Connection, Cursor, CursorOf, Statement, StatementOf};
use crate::error::{DriverResult, Result};
use crate::value::BoundValue;
use scopeguard::{ScopeGuard, guard};
use std::fmt;
use tracing::{debug, warn};

/// How a handle's statement is prepared and what its cursor yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
  /// Query rows; the cursor opens by executing the query.
  Select,
  /// Insert executed at construction; the cursor yields generated keys.
  Insert,
}

pub(crate) type CursorOpener<C> =
  Box<dyn FnOnce(&mut StatementOf<C>) -> DriverResult<CursorOf<C>> + Send>;

/// Resource slots released together. Each slot is closed at most once.
pub(crate) struct Resources<C: Connection> {
  name: String,
  pub(crate) cursor: Option<CursorOf<C>>,
  pub(crate) statement: Option<StatementOf<C>>,
  pub(crate) connection: Option<C>,
}

impl<C: Connection> Resources<C> {
  fn new(name: String, statement: StatementOf<C>, connection: Option<C>) -> Self {
    Self {
      name,
      cursor: None,
      statement: Some(statement),
      connection,
    }
  }

  pub(crate) fn name(&self) -> &str {
    &self.name
  }

  /// Closes cursor, statement and connection, in that order. A failing close is
  /// logged and does not stop the remaining ones.
  pub(crate) fn close_all(&mut self) {
    if let Some(mut cursor) = self.cursor.take() {
      if let Err(e) = cursor.close() {
        warn!(query = %self.name, error = %e, "failed to close cursor");
      }
    }
    if let Some(mut statement) = self.statement.take() {
      if let Err(e) = statement.close() {
        warn!(query = %self.name, error = %e, "failed to close statement");
      }
    }
    if let Some(mut connection) = self.connection.take() {
      if let Err(e) = connection.close() {
        warn!(query = %self.name, error = %e, "failed to close connection");
      }
    }
  }
}

impl<C: Connection> Drop for Resources<C> {
  fn drop(&mut self) {
    self.close_all();
  }
}

/// A prepared query whose result cursor has not been opened yet.
pub struct QueryHandle<C: Connection> {
  mode: QueryMode,
  affected_rows: Option<u64>,
  open: CursorOpener<C>,
  resources: Resources<C>,
}

impl<C: Connection> fmt::Debug for QueryHandle<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryHandle")
      .field("name", &self.resources.name)
      .field("mode", &self.mode)
      .field("affected_rows", &self.affected_rows)
      .field("owns_connection", &self.resources.connection.is_some())
      .finish()
  }
}

impl<C: Connection> QueryHandle<C> {
  /// Prepares and binds a query on a caller-owned connection.
  pub fn select(
    connection: &C,
    sql: &str,
    params: &[BoundValue],
    config: &QueryConfig,
  ) -> Result<Self> {
    let statement = prepare_select(connection, sql, params, config)?;
    Ok(Self::assemble(QueryMode::Select, None, statement, None, config))
  }

  /// Prepares, binds and executes an insert on a caller-owned connection.
  ///
  /// The insert runs before this returns. The handle's cursor yields the
  /// generated keys.
  pub fn insert(
    connection: &C,
    sql: &str,
    params: &[BoundValue],
    config: &QueryConfig,
  ) -> Result<Self> {
    let (statement, affected) = prepare_insert(connection, sql, params, config)?;
    Ok(Self::assemble(QueryMode::Insert, Some(affected), statement, None, config))
  }

  /// Like [`QueryHandle::select`], taking ownership of the connection.
  pub fn select_owned(
    connection: C,
    sql: &str,
    params: &[BoundValue],
    config: &QueryConfig,
  ) -> Result<Self> {
    let connection = close_on_unwind(connection, config.name());
    let statement = prepare_select(&*connection, sql, params, config)?;
    let connection = ScopeGuard::into_inner(connection);
    Ok(Self::assemble(QueryMode::Select, None, statement, Some(connection), config))
  }

  /// Like [`QueryHandle::insert`], taking ownership of the connection.
  pub fn insert_owned(
    connection: C,
    sql: &str,
    params: &[BoundValue],
    config: &QueryConfig,
  ) -> Result<Self> {
    let connection = close_on_unwind(connection, config.name());
    let (statement, affected) = prepare_insert(&*connection, sql, params, config)?;
    let connection = ScopeGuard::into_inner(connection);
    Ok(Self::assemble(
      QueryMode::Insert,
      Some(affected),
      statement,
      Some(connection),
      config,
    ))
  }

  fn assemble(
    mode: QueryMode,
    affected_rows: Option<u64>,
    statement: StatementOf<C>,
    connection: Option<C>,
    config: &QueryConfig,
  ) -> Self {
    let open: CursorOpener<C> = match mode {
      QueryMode::Select => Box::new(|statement: &mut StatementOf<C>| statement.execute_query()),
      QueryMode::Insert => Box::new(|statement: &mut StatementOf<C>| statement.generated_keys()),
    };
    Self {
      mode,
      affected_rows,
      open,
      resources: Resources::new(config.name().to_string(), statement, connection),
    }
  }

  /// Construction mode.
  pub fn mode(&self) -> QueryMode {
    self.mode
  }

  /// Rows affected by the eager insert; `None` for selects.
  pub fn affected_rows(&self) -> Option<u64> {
    self.affected_rows
  }

  /// Name used in log events.
  pub fn name(&self) -> &str {
    self.resources.name()
  }

  /// Whether the handle releases a connection along with its statement.
  pub fn owns_connection(&self) -> bool {
    self.resources.connection.is_some()
  }

  pub(crate) fn into_parts(self) -> (CursorOpener<C>, Resources<C>) {
    (self.open, self.resources)
  }
}

fn close_on_unwind<C: Connection>(
  connection: C,
  name: &str,
) -> ScopeGuard<C, impl FnOnce(C) + '_> {
  guard(connection, move |mut connection| {
    if let Err(e) = connection.close() {
      warn!(query = %name, error = %e, "failed to close connection after failed prepare");
    }
  })
}

fn prepare_statement<C: Connection>(
  connection: &C,
  sql: &str,
  params: &[BoundValue],
  config: &QueryConfig,
  returning_keys: bool,
) -> Result<StatementOf<C>> {
  let name = config.name();
  let statement = if returning_keys {
    connection.prepare_returning_keys(sql)?
  } else {
    connection.prepare(sql)?
  };
  let mut statement = guard(statement, |mut statement| {
    if let Err(e) = statement.close() {
      warn!(query = %name, error = %e, "failed to close statement after failed prepare");
    }
  });
  if let Some(rows) = config.fetch_size {
    statement.set_fetch_size(rows)?;
  }
  if let Some(timeout) = config.query_timeout {
    statement.set_query_timeout(timeout)?;
  }
  bind_parameters(&mut *statement, params)?;
  Ok(ScopeGuard::into_inner(statement))
}

fn prepare_select<C: Connection>(
  connection: &C,
  sql: &str,
  params: &[BoundValue],
  config: &QueryConfig,
) -> Result<StatementOf<C>> {
  debug!(query = %config.name(), mode = ?QueryMode::Select, params = params.len(), "preparing statement");
  prepare_statement(connection, sql, params, config, false)
}

fn prepare_insert<C: Connection>(
  connection: &C,
  sql: &str,
  params: &[BoundValue],
  config: &QueryConfig,
) -> Result<(StatementOf<C>, u64)> {
  let name = config.name();
  debug!(query = %name, mode = ?QueryMode::Insert, params = params.len(), "preparing statement");
  let statement = prepare_statement(connection, sql, params, config, true)?;
  let mut statement = guard(statement, |mut statement| {
    if let Err(e) = statement.close() {
      warn!(query = %name, error = %e, "failed to close statement after failed insert");
    }
  });
  let affected = statement.execute_update()?;
  debug!(query = %name, affected, "insert executed");
  Ok((ScopeGuard::into_inner(statement), affected))
}

/// Runs a data-modifying statement to completion and returns the affected row
/// count. The statement is closed on every path.
pub(crate) fn execute_update<C: Connection>(
  connection: &C,
  sql: &str,
  params: &[BoundValue],
  config: &QueryConfig,
) -> Result<u64> {
  debug!(query = %config.name(), params = params.len(), "preparing update");
  let mut statement = prepare_statement(connection, sql, params, config, false)?;
  let result = statement.execute_update();
  if let Err(e) = statement.close() {
    warn!(query = %config.name(), error = %e, "failed to close statement");
  }
  let affected = result?;
  debug!(query = %config.name(), affected, "update executed");
  Ok(affected)
}
