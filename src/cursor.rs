//! # Row Cursor
//!
//! [`RowCursor`] adapts a driver cursor, which only knows "advance and tell me
//! whether there is a row", to a peek/take iteration protocol.
//!
//! ## Pull protocol
//!
//! The cursor keeps the result of the last advance until a row is taken:
//!
//! - **no pending advance**: [`RowCursor::has_next`] advances the driver cursor
//!   and caches the answer; [`RowCursor::next_row`] advances and takes.
//! - **cached `true`**: `has_next` answers from the cache, `next_row` maps the
//!   current row without advancing again.
//! - **cached `false`**: terminal. The resources are already released.
//!
//! Calling `has_next` then `next_row` once per row therefore advances the driver
//! cursor exactly once per row.
//!
//! ## Release
//!
//! The cursor, statement and (if owned) connection are closed exactly once, by
//! whichever comes first: exhaustion, an error from the driver or the mapper, an
//! observed cancellation, an explicit [`RowCursor::release`], or drop. The
//! release guard is an atomic exchange owned by the cursor, so a second trigger
//! is a no-op.
//!
//! ## Cancellation
//!
//! A [`CancelHandle`] may be sent to another thread. Cancelling only raises a
//! flag; the consuming side observes it at the start of the next `has_next`,
//! before touching the driver cursor, releases, and reports no more rows. A
//! cancellation observed that way wins over a cached `true`; a cursor that is
//! already terminal stays exhausted, and [`RowCursor::was_cancelled`] tells the
//! two endings apart.

use crate::driver::{Connection, Cursor, CursorOf};
use crate::error::{Error, Result};
use crate::handle::{QueryHandle, Resources};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// Cloneable, thread-safe cancellation handle.
///
/// A handle only carries the cancel request. Each cursor opened under it keeps
/// its own release state, so a handle may be shared by successive cursors; once
/// cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
  cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
  /// Creates a handle that has not been cancelled.
  pub fn new() -> Self {
    Self::default()
  }

  /// Requests cancellation. The consuming side stops before its next advance.
  pub fn cancel(&self) {
    trace!("CancelHandle::cancel()");
    self.cancelled.store(true, Ordering::Release);
  }

  /// Whether cancellation has been requested.
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }
}

/// Single-pass iteration state over an open cursor.
///
/// Implements [`Iterator`] with `Result<T>` items; the iterator is fused after
/// exhaustion, an error or cancellation.
pub struct RowCursor<C, F, T>
where
  C: Connection,
{
  resources: Resources<C>,
  mapper: F,
  pending: Option<bool>,
  cancel: CancelHandle,
  released: AtomicBool,
  stopped_by_cancel: bool,
  _row: PhantomData<fn() -> T>,
}

impl<C, F, T> RowCursor<C, F, T>
where
  C: Connection,
{
  /// Handle that cancels this cursor from any thread.
  pub fn cancel_handle(&self) -> CancelHandle {
    self.cancel.clone()
  }

  /// Requests cancellation; see [`CancelHandle::cancel`].
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Whether the resources have been released.
  pub fn is_released(&self) -> bool {
    self.released.load(Ordering::Acquire)
  }

  /// Whether iteration ended because a cancellation was observed, as opposed
  /// to exhaustion or an error.
  pub fn was_cancelled(&self) -> bool {
    self.stopped_by_cancel
  }

  /// Closes cursor, statement and owned connection. Idempotent.
  pub fn release(&mut self) {
    if self.released.swap(true, Ordering::AcqRel) {
      return;
    }
    debug!(query = %self.resources.name(), "releasing cursor resources");
    self.resources.close_all();
  }

  fn finish(&mut self) {
    self.pending = Some(false);
    self.release();
  }

  fn finish_cancelled(&mut self) {
    self.stopped_by_cancel = true;
    self.finish();
  }
}

impl<C, F, T> RowCursor<C, F, T>
where
  C: Connection,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
  /// Opens `handle`'s cursor and wraps it.
  ///
  /// On failure the handle's resources are released before the error returns.
  pub fn open(handle: QueryHandle<C>, mapper: F) -> Result<Self> {
    Self::open_with(handle, mapper, CancelHandle::new())
  }

  /// Opens `handle`'s cursor under an existing cancellation handle.
  ///
  /// If `cancel` was already triggered the cursor is never opened: the
  /// statement and connection are released and the result reports no rows.
  pub fn open_with(handle: QueryHandle<C>, mapper: F, cancel: CancelHandle) -> Result<Self> {
    let (open, resources) = handle.into_parts();
    let mut rows = Self {
      resources,
      mapper,
      pending: None,
      cancel,
      released: AtomicBool::new(false),
      stopped_by_cancel: false,
      _row: PhantomData,
    };

    if rows.cancel.is_cancelled() {
      debug!(query = %rows.resources.name(), "cancelled before cursor open");
      rows.finish_cancelled();
      return Ok(rows);
    }

    let opened = match rows.resources.statement.as_mut() {
      Some(statement) => open(statement),
      None => Err("statement already closed".into()),
    };
    match opened {
      Ok(cursor) => {
        debug!(query = %rows.resources.name(), "cursor opened");
        rows.resources.cursor = Some(cursor);
        Ok(rows)
      }
      Err(e) => {
        rows.release();
        Err(Error::Execution(e))
      }
    }
  }

  /// Reports whether a row is available, advancing the driver cursor only if no
  /// advance is pending for the current position.
  pub fn has_next(&mut self) -> Result<bool> {
    if self.pending == Some(false) {
      return Ok(false);
    }
    if self.cancel.is_cancelled() {
      trace!("RowCursor::has_next() -> cancelled");
      self.finish_cancelled();
      return Ok(false);
    }
    if let Some(ready) = self.pending {
      trace!("RowCursor::has_next() -> {} (pending)", ready);
      return Ok(ready);
    }
    let ready = self.advance()?;
    self.pending = Some(ready);
    trace!("RowCursor::has_next() -> {}", ready);
    Ok(ready)
  }

  /// Takes the current row through the mapper, advancing first if `has_next`
  /// was not called for this position.
  ///
  /// Fails with [`Error::NoRow`] when no row is available.
  pub fn next_row(&mut self) -> Result<T> {
    let ready = match self.pending.take() {
      Some(ready) => ready,
      None => self.advance()?,
    };
    if !ready {
      self.pending = Some(false);
      return Err(Error::NoRow);
    }
    let mapped = match self.resources.cursor.as_ref() {
      Some(cursor) => (self.mapper)(cursor),
      None => return Err(Error::NoRow),
    };
    if mapped.is_err() {
      self.finish();
    }
    mapped
  }

  fn advance(&mut self) -> Result<bool> {
    let Some(cursor) = self.resources.cursor.as_mut() else {
      return Ok(false);
    };
    match cursor.advance() {
      Ok(true) => Ok(true),
      Ok(false) => {
        self.finish();
        Ok(false)
      }
      Err(e) => {
        self.finish();
        Err(Error::Execution(e))
      }
    }
  }
}

impl<C, F, T> Iterator for RowCursor<C, F, T>
where
  C: Connection,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
  type Item = Result<T>;

  fn next(&mut self) -> Option<Self::Item> {
    match self.has_next() {
      Ok(true) => Some(self.next_row()),
      Ok(false) => None,
      Err(e) => Some(Err(e)),
    }
  }
}

impl<C, F, T> std::iter::FusedIterator for RowCursor<C, F, T>
where
  C: Connection,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
}

impl<C, F, T> Drop for RowCursor<C, F, T>
where
  C: Connection,
{
  fn drop(&mut self) {
    self.release();
  }
}
