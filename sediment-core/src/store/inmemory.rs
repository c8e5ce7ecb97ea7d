//! In-memory event store for testing and examples.
//!
//! [`Store`] is a thread-safe reference implementation of [`EventWriter`] and
//! [`EventReader`]. Commits are held per aggregate in append order; reads
//! flatten them into the event stream the contracts describe.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    commit::Commit,
    event::AggregateId,
    store::{
        ConcurrencyConflict, ContinuationToken, EventReader, EventSlice, EventWriter, StoredEvent,
        WriteError,
    },
};

/// Error type for the in-memory store.
///
/// Writes cannot fail here other than by conflict; the only read failure is a
/// continuation token this store did not mint.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("malformed continuation token")]
    MalformedToken,
}

/// In-memory event store keyed by aggregate identifier.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<HashMap<AggregateId, Vec<Commit>>>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All commits written for an aggregate, in sequence order.
    #[must_use]
    pub fn commits(&self, aggregate_id: AggregateId) -> Vec<Commit> {
        let inner = self.inner.read().expect("in-memory store lock poisoned");
        inner.get(&aggregate_id).cloned().unwrap_or_default()
    }

    fn page(
        &self,
        aggregate_id: AggregateId,
        min_sequence: i64,
        max_sequence: i64,
        max_items: usize,
    ) -> EventSlice {
        // A zero page size would never drain the range.
        let max_items = max_items.max(1);

        let inner = self.inner.read().expect("in-memory store lock poisoned");
        let mut events: Vec<StoredEvent> = inner
            .get(&aggregate_id)
            .into_iter()
            .flatten()
            .flat_map(|commit| {
                commit.events.iter().map(|event| StoredEvent {
                    commit_sequence: commit.sequence_number,
                    event: event.clone(),
                })
            })
            .filter(|stored| {
                stored.event.sequence_number >= min_sequence
                    && stored.event.sequence_number <= max_sequence
            })
            .collect();
        drop(inner);

        let has_more = events.len() > max_items;
        events.truncate(max_items);

        let continuation = if has_more {
            let next = events
                .last()
                .map_or(min_sequence, |stored| stored.event.sequence_number + 1);
            Some(ContinuationToken::new(format!(
                "{aggregate_id}/{next}/{max_sequence}/{max_items}"
            )))
        } else {
            None
        };

        tracing::debug!(
            %aggregate_id,
            events_returned = events.len(),
            has_more,
            "event page read"
        );
        EventSlice {
            events,
            continuation,
        }
    }
}

impl EventWriter for Store {
    type Error = std::convert::Infallible;

    #[tracing::instrument(skip(self, commit), fields(aggregate_id = %commit.aggregate_id, sequence = commit.sequence_number))]
    async fn write_commit(&self, commit: &Commit) -> Result<(), WriteError<Self::Error>> {
        let mut inner = self.inner.write().expect("in-memory store lock poisoned");
        let stream = inner.entry(commit.aggregate_id).or_default();

        let expected = stream.last().map_or(0, |last| last.sequence_number + 1);
        if commit.sequence_number != expected {
            tracing::debug!(expected, actual = commit.sequence_number, "rejecting commit");
            return Err(ConcurrencyConflict {
                aggregate_id: commit.aggregate_id,
                sequence_number: commit.sequence_number,
            }
            .into());
        }

        stream.push(commit.clone());
        drop(inner);
        tracing::debug!(events = commit.event_count(), "commit written");
        Ok(())
    }
}

impl EventReader for Store {
    type Error = InMemoryError;

    #[tracing::instrument(skip(self))]
    async fn read_events(
        &self,
        aggregate_id: AggregateId,
        min_sequence: i64,
        max_sequence: i64,
        max_items: usize,
    ) -> Result<EventSlice, Self::Error> {
        Ok(self.page(aggregate_id, min_sequence, max_sequence, max_items))
    }

    #[tracing::instrument(skip(self, token))]
    async fn resume(&self, token: &ContinuationToken) -> Result<EventSlice, Self::Error> {
        let mut parts = token.as_str().split('/');
        let (Some(id), Some(min), Some(max), Some(items), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(InMemoryError::MalformedToken);
        };

        let aggregate_id = id
            .parse::<uuid::Uuid>()
            .map_err(|_| InMemoryError::MalformedToken)?;
        let min_sequence: i64 = min.parse().map_err(|_| InMemoryError::MalformedToken)?;
        let max_sequence: i64 = max.parse().map_err(|_| InMemoryError::MalformedToken)?;
        let max_items: usize = items.parse().map_err(|_| InMemoryError::MalformedToken)?;

        Ok(self.page(
            AggregateId::from_uuid(aggregate_id),
            min_sequence,
            max_sequence,
            max_items,
        ))
    }
}

#[cfg(test)]
mod tests {
    use nonempty::NonEmpty;

    use super::*;
    use crate::event::{PartitionKey, SerializedEvent};

    fn commit(aggregate_id: AggregateId, sequence_number: i64, event_seqs: &[i64]) -> Commit {
        let events = NonEmpty::from_vec(
            event_seqs
                .iter()
                .map(|&seq| SerializedEvent {
                    aggregate_id,
                    sequence_number: seq,
                    payload_type: "test".to_string(),
                    payload_bytes: b"{}".to_vec(),
                })
                .collect(),
        )
        .expect("test commits have events");
        Commit {
            aggregate_id,
            partition_key: PartitionKey::from(aggregate_id),
            sequence_number,
            timestamp_ms: 0,
            events,
        }
    }

    #[tokio::test]
    async fn first_commit_must_have_sequence_zero() {
        let store = Store::new();
        let id = AggregateId::new();
        let result = store.write_commit(&commit(id, 1, &[0])).await;
        assert!(matches!(result, Err(WriteError::Conflict(_))));
    }

    #[tokio::test]
    async fn duplicate_commit_sequence_conflicts() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_commit(&commit(id, 0, &[0])).await.unwrap();

        let result = store.write_commit(&commit(id, 0, &[0])).await;
        assert!(matches!(result, Err(WriteError::Conflict(_))));
        assert_eq!(store.commits(id).len(), 1);
    }

    #[tokio::test]
    async fn reads_flatten_commits_into_ordered_events() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_commit(&commit(id, 0, &[0])).await.unwrap();
        store.write_commit(&commit(id, 1, &[1, 2])).await.unwrap();

        let slice = store.read_events(id, 0, i64::MAX, 100).await.unwrap();
        let seqs: Vec<i64> = slice
            .events
            .iter()
            .map(|s| s.event.sequence_number)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(slice.events[2].commit_sequence, 1);
        assert!(slice.continuation.is_none());
    }

    #[tokio::test]
    async fn respects_sequence_bounds() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_commit(&commit(id, 0, &[0, 1, 2])).await.unwrap();

        let slice = store.read_events(id, 1, 1, 100).await.unwrap();
        assert_eq!(slice.events.len(), 1);
        assert_eq!(slice.events[0].event.sequence_number, 1);
    }

    #[tokio::test]
    async fn pages_and_resumes_in_order() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_commit(&commit(id, 0, &[0, 1, 2])).await.unwrap();
        store.write_commit(&commit(id, 1, &[3, 4])).await.unwrap();

        let first = store.read_events(id, 0, i64::MAX, 2).await.unwrap();
        assert_eq!(first.events.len(), 2);
        let token = first.continuation.expect("more events remain");

        let second = store.resume(&token).await.unwrap();
        assert_eq!(second.events.len(), 2);
        let token = second.continuation.expect("more events remain");

        let third = store.resume(&token).await.unwrap();
        assert_eq!(third.events.len(), 1);
        assert!(third.continuation.is_none());

        let seqs: Vec<i64> = [first.events, second.events, third.events]
            .into_iter()
            .flatten()
            .map(|s| s.event.sequence_number)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn exact_page_boundary_ends_without_token() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_commit(&commit(id, 0, &[0, 1])).await.unwrap();

        let slice = store.read_events(id, 0, i64::MAX, 2).await.unwrap();
        assert_eq!(slice.events.len(), 2);
        assert!(slice.continuation.is_none());
    }

    #[tokio::test]
    async fn empty_range_yields_exhausted_slice() {
        let store = Store::new();
        let slice = store
            .read_events(AggregateId::new(), 0, i64::MAX, 100)
            .await
            .unwrap();
        assert!(slice.events.is_empty());
        assert!(slice.continuation.is_none());
    }

    #[tokio::test]
    async fn foreign_token_is_rejected() {
        let store = Store::new();
        let result = store.resume(&ContinuationToken::new("not-a-token")).await;
        assert!(matches!(result, Err(InMemoryError::MalformedToken)));
    }
}
