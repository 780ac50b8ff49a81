//! # rowstream
//!
//! Lazy, cancellable row sequences over blocking, cursor-style database
//! clients.
//!
//! rowstream sits between a driver that exposes prepare / bind / execute /
//! advance / close and a consumer that wants rows as an iterator, a stream, a
//! push subscription or a single value. It guarantees that the cursor, the
//! statement and (when it acquired one) the connection are closed exactly once,
//! however consumption ends.
//!
//! ## Key Features
//!
//! - **Deferred execution**: nothing opens a cursor until the consumer pulls
//! - **Release once**: exhaustion, errors, cancellation and drop all funnel into
//!   one idempotent release
//! - **Back-pressure**: [`RowStream`] pulls one row per poll
//! - **Cross-thread cancellation**: [`CancelHandle`] is `Send + Sync`
//! - **Closed parameter domain**: [`BoundValue`] lists every bindable kind
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rowstream::{ConnectionExt, params};
//!
//! // Fire-and-forget update.
//! let updated = conn.execute("UPDATE t SET x = ? WHERE id = ?", params![5, 42])?;
//!
//! // Lazy select; the cursor opens on the first `next`.
//! for name in conn.select("SELECT name FROM t", params![]).rows(|row| Ok(row.get_string(0)?)) {
//!   println!("{}", name?);
//! }
//!
//! // Insert executes right away; generated keys are read lazily.
//! let key: i64 = conn
//!   .insert("INSERT INTO t(name) VALUES(?)", params!["a"])
//!   .single(|keys| Ok(keys.get_long(0)?))?;
//! ```
//!
//! Drivers plug in by implementing the traits in [`driver`].

#![deny(missing_docs)]

/// Positional parameter binding.
pub mod binder;
/// Per-query configuration.
pub mod config;
/// Single-pass cursor state and the pull protocol.
pub mod cursor;
/// Traits implemented by database drivers.
pub mod driver;
/// Error taxonomy.
pub mod error;
/// Prepared query handles.
pub mod handle;
/// Deferred queries and connection extension traits.
pub mod query;
/// Iterator, stream, publisher and reduction entry points.
pub mod sequence;
/// Bindable parameter values.
pub mod value;

pub use binder::{bind_any, bind_parameters};
pub use config::QueryConfig;
pub use cursor::{CancelHandle, RowCursor};
pub use driver::{Connection, ConnectionSource, Cursor, CursorOf, Statement, StatementOf};
pub use error::{DriverError, DriverResult, Error, Expected, Result};
pub use handle::{QueryHandle, QueryMode};
pub use query::{ConnectionExt, ConnectionSourceExt, Query};
pub use sequence::{Completion, Observer, RowPublisher, RowStream, Rows};
pub use value::{BoundValue, Decimal, EnumConstant, to_bound_values};

#[cfg(test)]
mod error_test;
