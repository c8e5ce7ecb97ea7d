//! In-memory snapshot store for testing and examples.

use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, RwLock},
};

use crate::{
    event::AggregateId,
    snapshot::{SerializedSnapshot, SnapshotReader, SnapshotRecord, SnapshotWriter},
};

/// In-memory snapshot store keeping the latest record per aggregate.
///
/// Stale writes (a record whose `event_sequence` is below the stored one)
/// are dropped silently, satisfying the lesser-sequence no-op requirement of
/// [`SnapshotWriter::write_snapshot`].
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<HashMap<AggregateId, SnapshotRecord>>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotWriter for Store {
    type Error = Infallible;

    #[tracing::instrument(skip(self, record), fields(aggregate_id = %record.aggregate_id, event_sequence = record.event_sequence))]
    async fn write_snapshot(&self, record: &SnapshotRecord) -> Result<(), Self::Error> {
        let mut inner = self.inner.write().expect("snapshot store lock poisoned");
        match inner.get(&record.aggregate_id) {
            Some(existing) if existing.event_sequence > record.event_sequence => {
                tracing::debug!(
                    stored_sequence = existing.event_sequence,
                    "stale snapshot ignored"
                );
            }
            _ => {
                inner.insert(record.aggregate_id, record.clone());
                tracing::debug!("snapshot stored");
            }
        }
        Ok(())
    }
}

impl SnapshotReader for Store {
    type Error = Infallible;

    #[tracing::instrument(skip(self))]
    async fn read_snapshot(
        &self,
        aggregate_id: AggregateId,
        up_to_sequence: i64,
    ) -> Result<SerializedSnapshot, Self::Error> {
        let inner = self.inner.read().expect("snapshot store lock poisoned");
        let snapshot = match inner.get(&aggregate_id) {
            Some(record) if record.event_sequence <= up_to_sequence => {
                SerializedSnapshot::Present(record.clone())
            }
            _ => SerializedSnapshot::Empty { aggregate_id },
        };
        drop(inner);
        tracing::trace!(found = !snapshot.is_empty(), "snapshot lookup");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PartitionKey;

    fn record(aggregate_id: AggregateId, event_sequence: i64) -> SnapshotRecord {
        SnapshotRecord {
            aggregate_id,
            partition_key: PartitionKey::from(aggregate_id),
            commit_sequence: event_sequence,
            event_sequence,
            memento_bytes: format!("{event_sequence}").into_bytes(),
        }
    }

    #[tokio::test]
    async fn read_without_snapshot_yields_empty() {
        let store = Store::new();
        let id = AggregateId::new();
        let raw = store.read_snapshot(id, i64::MAX).await.unwrap();
        assert_eq!(raw, SerializedSnapshot::Empty { aggregate_id: id });
    }

    #[tokio::test]
    async fn stores_and_reads_back_latest() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_snapshot(&record(id, 3)).await.unwrap();
        store.write_snapshot(&record(id, 9)).await.unwrap();

        let raw = store.read_snapshot(id, i64::MAX).await.unwrap();
        assert_eq!(raw, SerializedSnapshot::Present(record(id, 9)));
    }

    #[tokio::test]
    async fn stale_write_is_a_noop() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_snapshot(&record(id, 9)).await.unwrap();
        store.write_snapshot(&record(id, 3)).await.unwrap();

        let raw = store.read_snapshot(id, i64::MAX).await.unwrap();
        assert_eq!(raw.event_sequence(), 9);
    }

    #[tokio::test]
    async fn same_sequence_write_is_idempotent() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_snapshot(&record(id, 9)).await.unwrap();
        store.write_snapshot(&record(id, 9)).await.unwrap();

        let raw = store.read_snapshot(id, i64::MAX).await.unwrap();
        assert_eq!(raw, SerializedSnapshot::Present(record(id, 9)));
    }

    #[tokio::test]
    async fn snapshot_beyond_bound_is_not_returned() {
        let store = Store::new();
        let id = AggregateId::new();
        store.write_snapshot(&record(id, 9)).await.unwrap();

        let raw = store.read_snapshot(id, 5).await.unwrap();
        assert!(raw.is_empty());
    }
}
