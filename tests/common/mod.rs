//! In-memory driver that records every call, shared by the integration tests.

#![allow(dead_code)]

use rowstream::{
  BoundValue, CancelHandle, Connection, ConnectionSource, Cursor, Decimal, DriverResult, Statement,
};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard, Once};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Routes `tracing` output to the test harness.
pub fn init_tracing() {
  TRACING.call_once(|| {
    let _ = tracing_subscriber::fmt()
      .with_max_level(tracing::Level::DEBUG)
      .with_test_writer()
      .try_init();
  });
}

/// Call counters and bound parameters observed by the driver.
#[derive(Debug, Default, Clone)]
pub struct Log {
  pub acquires: usize,
  pub prepares: usize,
  pub keyed_prepares: usize,
  pub updates: usize,
  pub queries: usize,
  pub key_fetches: usize,
  pub advances: usize,
  pub cursor_closes: usize,
  pub statement_closes: usize,
  pub connection_closes: usize,
  pub fetch_size: Option<u32>,
  pub query_timeout: Option<Duration>,
  pub binds: Vec<(usize, String)>,
}

/// Scripted behaviour of the fake database.
#[derive(Debug, Clone, Default)]
pub struct Script {
  pub rows: Vec<Vec<BoundValue>>,
  pub keys: Vec<Vec<BoundValue>>,
  pub affected: u64,
  pub fail_prepare: bool,
  pub fail_bind_at: Option<usize>,
  pub fail_update: bool,
  pub fail_open: bool,
  pub fail_advance_at: Option<usize>,
  pub fail_cursor_close: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockDb {
  script: Arc<Script>,
  log: Arc<Mutex<Log>>,
  on_exhausted: Arc<Mutex<Option<CancelHandle>>>,
}

impl MockDb {
  pub fn new(script: Script) -> Self {
    init_tracing();
    Self {
      script: Arc::new(script),
      log: Arc::new(Mutex::new(Log::default())),
      on_exhausted: Arc::default(),
    }
  }

  /// Database whose queries yield rows `[1]`, `[2]`, ... `[n]`.
  pub fn with_rows(n: i64) -> Self {
    Self::new(Script {
      rows: (1..=n).map(|i| vec![BoundValue::Long(i)]).collect(),
      ..Script::default()
    })
  }

  pub fn connect(&self) -> MockConnection {
    MockConnection { db: self.clone() }
  }

  /// Cancels `handle` from inside the advance that reports exhaustion.
  pub fn cancel_on_exhaustion(&self, handle: CancelHandle) {
    *self.on_exhausted.lock().unwrap() = Some(handle);
  }

  pub fn log(&self) -> Log {
    self.lock().clone()
  }

  fn lock(&self) -> MutexGuard<'_, Log> {
    self.log.lock().unwrap()
  }
}

impl ConnectionSource for MockDb {
  type Connection = MockConnection;

  fn acquire(&self) -> DriverResult<MockConnection> {
    self.lock().acquires += 1;
    Ok(self.connect())
  }
}

#[derive(Debug)]
pub struct MockConnection {
  db: MockDb,
}

impl MockConnection {
  fn statement(&self, sql: &str, returning_keys: bool) -> DriverResult<MockStatement> {
    if self.db.script.fail_prepare {
      return Err(format!("cannot prepare {:?}", sql).into());
    }
    Ok(MockStatement {
      db: self.db.clone(),
      returning_keys,
      executed: false,
    })
  }
}

impl Connection for MockConnection {
  type Statement = MockStatement;

  fn prepare(&self, sql: &str) -> DriverResult<MockStatement> {
    self.db.lock().prepares += 1;
    self.statement(sql, false)
  }

  fn prepare_returning_keys(&self, sql: &str) -> DriverResult<MockStatement> {
    self.db.lock().keyed_prepares += 1;
    self.statement(sql, true)
  }

  fn close(&mut self) -> DriverResult<()> {
    self.db.lock().connection_closes += 1;
    Ok(())
  }
}

#[derive(Debug)]
pub struct MockStatement {
  db: MockDb,
  returning_keys: bool,
  executed: bool,
}

impl MockStatement {
  fn record(&mut self, index: usize, value: String) -> DriverResult<()> {
    if self.db.script.fail_bind_at == Some(index) {
      return Err(format!("bad value at {}", index).into());
    }
    self.db.lock().binds.push((index, value));
    Ok(())
  }
}

impl Statement for MockStatement {
  type Cursor = MockCursor;

  fn set_null(&mut self, index: usize) -> DriverResult<()> {
    self.record(index, "null".to_string())
  }

  fn set_uuid(&mut self, index: usize, value: uuid::Uuid) -> DriverResult<()> {
    self.record(index, format!("uuid:{}", value))
  }

  fn set_int(&mut self, index: usize, value: i32) -> DriverResult<()> {
    self.record(index, format!("int:{}", value))
  }

  fn set_long(&mut self, index: usize, value: i64) -> DriverResult<()> {
    self.record(index, format!("long:{}", value))
  }

  fn set_string(&mut self, index: usize, value: &str) -> DriverResult<()> {
    self.record(index, format!("string:{}", value))
  }

  fn set_double(&mut self, index: usize, value: f64) -> DriverResult<()> {
    self.record(index, format!("double:{}", value))
  }

  fn set_float(&mut self, index: usize, value: f32) -> DriverResult<()> {
    self.record(index, format!("float:{}", value))
  }

  fn set_bool(&mut self, index: usize, value: bool) -> DriverResult<()> {
    self.record(index, format!("bool:{}", value))
  }

  fn set_date(&mut self, index: usize, value: chrono::NaiveDate) -> DriverResult<()> {
    self.record(index, format!("date:{}", value))
  }

  fn set_time(&mut self, index: usize, value: chrono::NaiveTime) -> DriverResult<()> {
    self.record(index, format!("time:{}", value))
  }

  fn set_timestamp(&mut self, index: usize, value: chrono::NaiveDateTime) -> DriverResult<()> {
    self.record(index, format!("timestamp:{}", value))
  }

  fn set_decimal(&mut self, index: usize, value: &Decimal) -> DriverResult<()> {
    self.record(index, format!("decimal:{}", value))
  }

  fn set_binary_stream(
    &mut self,
    index: usize,
    mut reader: Box<dyn Read + Send>,
  ) -> DriverResult<()> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    self.record(index, format!("binary:{:?}", buf))
  }

  fn set_object(&mut self, index: usize, name: &str) -> DriverResult<()> {
    self.record(index, format!("object:{}", name))
  }

  fn set_fetch_size(&mut self, rows: u32) -> DriverResult<()> {
    self.db.lock().fetch_size = Some(rows);
    Ok(())
  }

  fn set_query_timeout(&mut self, timeout: Duration) -> DriverResult<()> {
    self.db.lock().query_timeout = Some(timeout);
    Ok(())
  }

  fn execute_update(&mut self) -> DriverResult<u64> {
    self.db.lock().updates += 1;
    if self.db.script.fail_update {
      return Err("constraint violation".into());
    }
    self.executed = true;
    Ok(self.db.script.affected)
  }

  fn execute_query(&mut self) -> DriverResult<MockCursor> {
    self.db.lock().queries += 1;
    if self.db.script.fail_open {
      return Err("connection lost".into());
    }
    Ok(MockCursor::new(self.db.clone(), self.db.script.rows.clone()))
  }

  fn generated_keys(&mut self) -> DriverResult<MockCursor> {
    self.db.lock().key_fetches += 1;
    if !self.returning_keys || !self.executed {
      return Err("no generated keys".into());
    }
    Ok(MockCursor::new(self.db.clone(), self.db.script.keys.clone()))
  }

  fn close(&mut self) -> DriverResult<()> {
    self.db.lock().statement_closes += 1;
    Ok(())
  }
}

#[derive(Debug)]
pub struct MockCursor {
  db: MockDb,
  rows: Vec<Vec<BoundValue>>,
  position: Option<usize>,
}

impl MockCursor {
  fn new(db: MockDb, rows: Vec<Vec<BoundValue>>) -> Self {
    Self {
      db,
      rows,
      position: None,
    }
  }

  pub fn get(&self, column: usize) -> DriverResult<BoundValue> {
    let row = self
      .position
      .and_then(|p| self.rows.get(p))
      .ok_or("cursor is not on a row")?;
    row
      .get(column)
      .cloned()
      .ok_or_else(|| format!("no column {}", column).into())
  }

  pub fn get_long(&self, column: usize) -> DriverResult<i64> {
    match self.get(column)? {
      BoundValue::Long(v) => Ok(v),
      BoundValue::Int(v) => Ok(v as i64),
      other => Err(format!("column {} is {}", column, other.kind()).into()),
    }
  }

  pub fn get_string(&self, column: usize) -> DriverResult<String> {
    match self.get(column)? {
      BoundValue::String(v) => Ok(v),
      other => Err(format!("column {} is {}", column, other.kind()).into()),
    }
  }
}

impl Cursor for MockCursor {
  fn advance(&mut self) -> DriverResult<bool> {
    let advances = {
      let mut log = self.db.lock();
      log.advances += 1;
      log.advances
    };
    if self.db.script.fail_advance_at == Some(advances) {
      return Err("network error during fetch".into());
    }
    let next = self.position.map_or(0, |p| p + 1);
    self.position = Some(next);
    let has_row = next < self.rows.len();
    if !has_row {
      if let Some(handle) = self.db.on_exhausted.lock().unwrap().as_ref() {
        handle.cancel();
      }
    }
    Ok(has_row)
  }

  fn close(&mut self) -> DriverResult<()> {
    self.db.lock().cursor_closes += 1;
    if self.db.script.fail_cursor_close {
      return Err("cursor already gone".into());
    }
    Ok(())
  }
}
