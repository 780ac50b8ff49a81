//! Per-query configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_NAME: &str = "query";

/// Settings applied when a query is prepared.
///
/// `fetch_size` and `query_timeout` are handed to the driver unchanged; this
/// crate never enforces a timeout of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
  /// Name attached to log events.
  pub name: Option<String>,
  /// Driver fetch-size hint.
  pub fetch_size: Option<u32>,
  /// Driver statement timeout.
  pub query_timeout: Option<Duration>,
}

impl QueryConfig {
  /// Sets the name attached to log events.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets the fetch-size hint.
  pub fn with_fetch_size(mut self, rows: u32) -> Self {
    self.fetch_size = Some(rows);
    self
  }

  /// Sets the statement timeout.
  pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
    self.query_timeout = Some(timeout);
    self
  }

  /// Name used in log events.
  pub fn name(&self) -> &str {
    self.name.as_deref().unwrap_or(DEFAULT_NAME)
  }
}
