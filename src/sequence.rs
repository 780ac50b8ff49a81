//! # Lazy Row Sequences
//!
//! Entry points that turn a query into consumable rows. Every one of them is
//! deferred: the query is prepared (when built from a [`Query`](crate::Query))
//! and the cursor opened only when the consumer first pulls, polls or
//! subscribes.
//!
//! ## Forms
//!
//! - [`Rows`]: blocking [`Iterator`] of `Result<T>`.
//! - [`RowStream`]: [`futures::Stream`] of `Result<T>`. Each poll pulls at most one
//!   row, so a slow consumer is never buffered ahead of.
//! - [`RowPublisher`]: push delivery to an [`Observer`] on the subscribing thread,
//!   stoppable through its [`CancelHandle`].
//! - single and optional reductions, blocking ([`QueryHandle::single`],
//!   [`QueryHandle::optional`]) and as futures ([`QueryHandle::fetch_one`],
//!   [`QueryHandle::fetch_optional`]).
//!
//! All forms share the [`RowCursor`] pull protocol, so release happens exactly
//! once on exhaustion, error, cancellation or drop.

use crate::cursor::{CancelHandle, RowCursor};
use crate::driver::{Connection, CursorOf};
use crate::error::{Error, Expected, Result};
use crate::handle::QueryHandle;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;

enum Stage<C, P, F, T>
where
  C: Connection,
{
  Deferred(P, F),
  Open(RowCursor<C, F, T>),
  Cancelled,
  Done,
}

impl<C, P, F, T> Stage<C, P, F, T>
where
  C: Connection,
  P: FnOnce() -> Result<QueryHandle<C>>,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
  fn pull(&mut self, cancel: &CancelHandle) -> Option<Result<T>> {
    match std::mem::replace(self, Stage::Done) {
      // Once cancelled the factory never runs: no connection, no insert.
      Stage::Deferred(..) if cancel.is_cancelled() => {
        debug!("cancelled before prepare");
        *self = Stage::Cancelled;
        None
      }
      Stage::Deferred(prepare, mapper) => {
        let opened = prepare().and_then(|handle| RowCursor::open_with(handle, mapper, cancel.clone()));
        match opened {
          Ok(cursor) => {
            *self = Stage::Open(cursor);
            self.pull(cancel)
          }
          Err(e) => Some(Err(e)),
        }
      }
      Stage::Open(mut cursor) => {
        let item = cursor.next();
        match item {
          Some(Ok(_)) => *self = Stage::Open(cursor),
          None if cursor.was_cancelled() => *self = Stage::Cancelled,
          _ => {}
        }
        item
      }
      Stage::Cancelled => {
        *self = Stage::Cancelled;
        None
      }
      Stage::Done => None,
    }
  }

  fn was_cancelled(&self) -> bool {
    matches!(self, Stage::Cancelled)
  }
}

/// Blocking, lazily opened row iterator.
pub struct Rows<C, P, F, T>
where
  C: Connection,
{
  stage: Stage<C, P, F, T>,
  cancel: CancelHandle,
}

impl<C, P, F, T> Rows<C, P, F, T>
where
  C: Connection,
{
  pub(crate) fn new(prepare: P, mapper: F) -> Self {
    Self {
      stage: Stage::Deferred(prepare, mapper),
      cancel: CancelHandle::new(),
    }
  }

  /// Handle that stops iteration from any thread.
  pub fn cancel_handle(&self) -> CancelHandle {
    self.cancel.clone()
  }

  /// Whether the cursor has been opened.
  pub fn is_started(&self) -> bool {
    !matches!(self.stage, Stage::Deferred(..))
  }
}

impl<C, P, F, T> Iterator for Rows<C, P, F, T>
where
  C: Connection,
  P: FnOnce() -> Result<QueryHandle<C>>,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
  type Item = Result<T>;

  fn next(&mut self) -> Option<Self::Item> {
    self.stage.pull(&self.cancel)
  }
}

impl<C, P, F, T> std::iter::FusedIterator for Rows<C, P, F, T>
where
  C: Connection,
  P: FnOnce() -> Result<QueryHandle<C>>,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
}

/// Demand-driven row stream. Dropping it before exhaustion releases the cursor.
pub struct RowStream<C, P, F, T>
where
  C: Connection,
{
  stage: Stage<C, P, F, T>,
  cancel: CancelHandle,
}

// No field is ever pinned; the stream only moves its stage in and out by value.
impl<C, P, F, T> Unpin for RowStream<C, P, F, T> where C: Connection {}

impl<C, P, F, T> RowStream<C, P, F, T>
where
  C: Connection,
{
  pub(crate) fn new(prepare: P, mapper: F) -> Self {
    Self {
      stage: Stage::Deferred(prepare, mapper),
      cancel: CancelHandle::new(),
    }
  }

  /// Handle that ends the stream from any thread.
  pub fn cancel_handle(&self) -> CancelHandle {
    self.cancel.clone()
  }
}

impl<C, P, F, T> Stream for RowStream<C, P, F, T>
where
  C: Connection,
  P: FnOnce() -> Result<QueryHandle<C>>,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
  type Item = Result<T>;

  fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    Poll::Ready(this.stage.pull(&this.cancel))
  }
}

/// Receives rows pushed by a [`RowPublisher`].
pub trait Observer<T> {
  /// Called once per row, in cursor order.
  fn on_next(&mut self, item: T);

  /// Called once if the query fails. Resources are already released.
  fn on_error(&mut self, _error: &Error) {}

  /// Called once after the last row when the cursor is exhausted. Not called
  /// after a cancellation.
  fn on_complete(&mut self) {}
}

impl<T, G> Observer<T> for G
where
  G: FnMut(T),
{
  fn on_next(&mut self, item: T) {
    self(item)
  }
}

/// How a subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
  /// Every row was delivered.
  Exhausted,
  /// The subscription was cancelled before exhaustion.
  Cancelled,
}

/// Push-style delivery of rows to an [`Observer`].
///
/// Nothing happens until [`RowPublisher::subscribe`]; the subscription then runs
/// on the calling thread. The handle from [`RowPublisher::subscription`] may be
/// taken before subscribing and used from the observer or another thread to stop
/// delivery.
pub struct RowPublisher<C, P, F, T>
where
  C: Connection,
{
  stage: Stage<C, P, F, T>,
  cancel: CancelHandle,
}

impl<C, P, F, T> RowPublisher<C, P, F, T>
where
  C: Connection,
  P: FnOnce() -> Result<QueryHandle<C>>,
  F: FnMut(&CursorOf<C>) -> Result<T>,
{
  pub(crate) fn new(prepare: P, mapper: F) -> Self {
    Self {
      stage: Stage::Deferred(prepare, mapper),
      cancel: CancelHandle::new(),
    }
  }

  /// Cancellation handle for the upcoming subscription.
  pub fn subscription(&self) -> CancelHandle {
    self.cancel.clone()
  }

  /// Opens the cursor and pushes every row to `observer`.
  ///
  /// Errors are reported to [`Observer::on_error`] and returned; resources are
  /// released before either callback runs.
  pub fn subscribe<O>(self, observer: &mut O) -> Result<Completion>
  where
    O: Observer<T> + ?Sized,
  {
    let Self { mut stage, cancel } = self;
    let outcome = loop {
      match stage.pull(&cancel) {
        Some(Ok(item)) => observer.on_next(item),
        Some(Err(e)) => break Err(e),
        None => break Ok(stage.was_cancelled()),
      }
    };
    drop(stage);

    match outcome {
      Err(e) => {
        observer.on_error(&e);
        Err(e)
      }
      Ok(true) => {
        debug!("subscription cancelled");
        Ok(Completion::Cancelled)
      }
      Ok(false) => {
        observer.on_complete();
        Ok(Completion::Exhausted)
      }
    }
  }
}

fn at_most_one<T>(rows: impl Iterator<Item = Result<T>>, expected: Expected) -> Result<Option<T>> {
  let mut rows = rows;
  let Some(first) = rows.next() else {
    return Ok(None);
  };
  let first = first?;
  match rows.next() {
    None => Ok(Some(first)),
    Some(Err(e)) => Err(e),
    Some(Ok(_)) => {
      drop(rows);
      Err(Error::Cardinality { expected, found: 2 })
    }
  }
}

async fn at_most_one_async<T, S>(rows: S, expected: Expected) -> Result<Option<T>>
where
  S: Stream<Item = Result<T>> + Unpin,
{
  let mut rows = rows;
  let Some(first) = rows.next().await else {
    return Ok(None);
  };
  let first = first?;
  match rows.next().await {
    None => Ok(Some(first)),
    Some(Err(e)) => Err(e),
    Some(Ok(_)) => {
      drop(rows);
      Err(Error::Cardinality { expected, found: 2 })
    }
  }
}

pub(crate) fn single<T>(rows: impl Iterator<Item = Result<T>>) -> Result<T> {
  at_most_one(rows, Expected::ExactlyOne)?.ok_or(Error::Cardinality {
    expected: Expected::ExactlyOne,
    found: 0,
  })
}

pub(crate) fn optional<T>(rows: impl Iterator<Item = Result<T>>) -> Result<Option<T>> {
  at_most_one(rows, Expected::AtMostOne)
}

pub(crate) async fn fetch_one<T, S>(rows: S) -> Result<T>
where
  S: Stream<Item = Result<T>> + Unpin,
{
  at_most_one_async(rows, Expected::ExactlyOne)
    .await?
    .ok_or(Error::Cardinality {
      expected: Expected::ExactlyOne,
      found: 0,
    })
}

pub(crate) async fn fetch_optional<T, S>(rows: S) -> Result<Option<T>>
where
  S: Stream<Item = Result<T>> + Unpin,
{
  at_most_one_async(rows, Expected::AtMostOne).await
}

impl<C> QueryHandle<C>
where
  C: Connection,
{
  /// Opens the cursor now and returns the raw pull protocol.
  pub fn open<F, T>(self, mapper: F) -> Result<RowCursor<C, F, T>>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    RowCursor::open(self, mapper)
  }

  /// Blocking iterator; the cursor opens on the first `next`.
  pub fn rows<F, T>(
    self,
    mapper: F,
  ) -> Rows<C, impl FnOnce() -> Result<QueryHandle<C>>, F, T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    Rows::new(move || Ok(self), mapper)
  }

  /// Demand-driven stream; the cursor opens on the first poll.
  pub fn stream<F, T>(
    self,
    mapper: F,
  ) -> RowStream<C, impl FnOnce() -> Result<QueryHandle<C>>, F, T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    RowStream::new(move || Ok(self), mapper)
  }

  /// Push publisher; the cursor opens on subscribe.
  pub fn publisher<F, T>(
    self,
    mapper: F,
  ) -> RowPublisher<C, impl FnOnce() -> Result<QueryHandle<C>>, F, T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    RowPublisher::new(move || Ok(self), mapper)
  }

  /// Reads exactly one row.
  pub fn single<F, T>(self, mapper: F) -> Result<T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    single(self.rows(mapper))
  }

  /// Reads zero or one row.
  pub fn optional<F, T>(self, mapper: F) -> Result<Option<T>>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    optional(self.rows(mapper))
  }

  /// Future resolving to exactly one row. Nothing runs until it is polled.
  pub async fn fetch_one<F, T>(self, mapper: F) -> Result<T>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    fetch_one(self.stream(mapper)).await
  }

  /// Future resolving to zero or one row. Nothing runs until it is polled.
  pub async fn fetch_optional<F, T>(self, mapper: F) -> Result<Option<T>>
  where
    F: FnMut(&CursorOf<C>) -> Result<T>,
  {
    fetch_optional(self.stream(mapper)).await
  }
}
