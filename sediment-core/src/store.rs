//! Event storage provider contracts.
//!
//! This module describes the write and read sides of the durable event
//! substrate ([`EventWriter`], [`EventReader`]), the wire form events take on
//! the way back out ([`StoredEvent`], [`EventSlice`]), and paging
//! ([`ContinuationToken`]). A reference in-memory implementation lives in
//! [`inmemory`].
//!
//! Providers must preserve these semantics across process and node failures:
//!
//! - **Atomicity** - all events of a commit become visible together under the
//!   commit's sequence number, or none do
//! - **Optimistic concurrency** - writing a commit whose
//!   `(aggregate_id, sequence_number)` already exists fails with
//!   [`ConcurrencyConflict`]
//! - **Durability before acknowledgement** - reads after a successful write
//!   observe the commit
//! - **No reordering** - within an aggregate, commits and events are returned
//!   in ascending sequence order

use std::future::Future;

use thiserror::Error;

use crate::{
    commit::Commit,
    event::{AggregateId, SerializedEvent},
};

pub mod inmemory;

/// An optimistic-concurrency conflict: the targeted commit slot was already
/// taken by another writer.
///
/// The losing writer must reload the aggregate, re-apply its intent against
/// the new event sequence, and retry. The engine performs no automatic retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "concurrency conflict: commit {sequence_number} already exists for aggregate {aggregate_id} \
     (hint: another writer advanced this aggregate; reload and retry)"
)]
pub struct ConcurrencyConflict {
    pub aggregate_id: AggregateId,
    pub sequence_number: i64,
}

/// Error from [`EventWriter::write_commit`].
#[derive(Debug, Error)]
pub enum WriteError<E>
where
    E: std::error::Error,
{
    /// Another writer advanced the aggregate first.
    #[error(transparent)]
    Conflict(#[from] ConcurrencyConflict),
    /// Transport or backend failure; retryable at the caller's discretion.
    #[error("storage unavailable: {0}")]
    Storage(#[source] E),
}

/// Write side of the event substrate.
pub trait EventWriter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Durably persist a commit.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Conflict`] if a commit with the same aggregate
    /// and sequence number already exists, or [`WriteError::Storage`] on
    /// backend failure. A failed write must leave no partial events visible.
    fn write_commit<'a>(
        &'a self,
        commit: &'a Commit,
    ) -> impl Future<Output = Result<(), WriteError<Self::Error>>> + Send + 'a;
}

/// An event materialized from the store, annotated with the sequence number
/// of the commit that carried it.
///
/// The commit coordinate is what lets a reader track an aggregate's commit
/// sequence while folding events one at a time, including under bounds that
/// stop mid-commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub commit_sequence: i64,
    pub event: SerializedEvent,
}

/// Opaque paging token minted by an [`EventReader`].
///
/// Callers must treat tokens as black boxes: they cannot be synthesized,
/// compared, or inspected, only passed back to [`EventReader::resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of events from an [`EventReader`].
#[derive(Debug, Clone)]
pub struct EventSlice {
    /// Events in strictly increasing `sequence_number` order. Empty only when
    /// the requested range is exhausted.
    pub events: Vec<StoredEvent>,
    /// `None` when the range is exhausted; otherwise the token to pass to
    /// [`EventReader::resume`]. Resuming preserves the ordering invariant
    /// across calls.
    pub continuation: Option<ContinuationToken>,
}

/// Read side of the event substrate.
///
/// Providers may batch across commit boundaries transparently; callers see a
/// flat event stream.
pub trait EventReader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read events with `min_sequence <= sequence_number <= max_sequence`,
    /// at most `max_items` per page.
    ///
    /// # Errors
    ///
    /// Returns a provider-specific error on backend failure.
    fn read_events<'a>(
        &'a self,
        aggregate_id: AggregateId,
        min_sequence: i64,
        max_sequence: i64,
        max_items: usize,
    ) -> impl Future<Output = Result<EventSlice, Self::Error>> + Send + 'a;

    /// Continue a paged read from where a previous slice left off.
    ///
    /// # Errors
    ///
    /// Returns a provider-specific error on backend failure or when the token
    /// was not minted by this provider.
    fn resume<'a>(
        &'a self,
        token: &'a ContinuationToken,
    ) -> impl Future<Output = Result<EventSlice, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_message_names_sequence_and_hints_retry() {
        let conflict = ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            sequence_number: 7,
        };
        let msg = conflict.to_string();
        assert!(msg.contains("commit 7 already exists"));
        assert!(msg.contains("reload and retry"));
    }

    #[test]
    fn write_error_is_transparent_for_conflicts() {
        let conflict = ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            sequence_number: 0,
        };
        let err: WriteError<std::io::Error> = conflict.clone().into();
        assert_eq!(err.to_string(), conflict.to_string());
    }

    #[test]
    fn write_error_storage_names_cause() {
        let err: WriteError<std::io::Error> =
            WriteError::Storage(std::io::Error::other("connection reset"));
        let msg = err.to_string();
        assert!(msg.contains("storage unavailable"));
        assert!(msg.contains("connection reset"));
    }
}
