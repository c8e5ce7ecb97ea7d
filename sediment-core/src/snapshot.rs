//! Snapshot types and storage provider contracts.
//!
//! A snapshot checkpoints an aggregate's committed state at a
//! `(commit_sequence, event_sequence)` position so rehydration can skip the
//! prefix of the event log. This module provides:
//!
//! - [`Snapshot`] - the typed checkpoint, memento included
//! - [`SnapshotRecord`] / [`SerializedSnapshot`] - the storage forms
//! - [`SnapshotWriter`] / [`SnapshotReader`] - the provider contracts
//! - [`inmemory`] - a thread-safe reference implementation

use std::future::Future;

use crate::event::{AggregateId, INITIAL_SEQUENCE, PartitionKey};

pub mod inmemory;

/// A typed checkpoint of committed aggregate state.
///
/// The memento is the domain-specific folded state; the engine never
/// inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<M> {
    pub aggregate_id: AggregateId,
    pub partition_key: PartitionKey,
    pub commit_sequence: i64,
    pub event_sequence: i64,
    pub memento: M,
}

impl<M: Default> Snapshot<M> {
    /// The snapshot of an aggregate with no committed history: position
    /// `(-1, -1)`, default memento, conventional partition key.
    #[must_use]
    pub fn empty(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id,
            partition_key: PartitionKey::from(aggregate_id),
            commit_sequence: INITIAL_SEQUENCE,
            event_sequence: INITIAL_SEQUENCE,
            memento: M::default(),
        }
    }
}

/// A snapshot in its storage form: opaque memento bytes plus position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub aggregate_id: AggregateId,
    pub partition_key: PartitionKey,
    pub commit_sequence: i64,
    pub event_sequence: i64,
    pub memento_bytes: Vec<u8>,
}

/// Result of a snapshot lookup.
///
/// A tagged type rather than sentinel field values, so both paths are
/// covered by exhaustiveness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializedSnapshot {
    /// No snapshot exists at or below the requested sequence.
    Empty { aggregate_id: AggregateId },
    Present(SnapshotRecord),
}

impl SerializedSnapshot {
    #[must_use]
    pub const fn aggregate_id(&self) -> AggregateId {
        match self {
            Self::Empty { aggregate_id } => *aggregate_id,
            Self::Present(record) => record.aggregate_id,
        }
    }

    /// `-1` for the empty snapshot.
    #[must_use]
    pub const fn commit_sequence(&self) -> i64 {
        match self {
            Self::Empty { .. } => INITIAL_SEQUENCE,
            Self::Present(record) => record.commit_sequence,
        }
    }

    /// `-1` for the empty snapshot.
    #[must_use]
    pub const fn event_sequence(&self) -> i64 {
        match self {
            Self::Empty { .. } => INITIAL_SEQUENCE,
            Self::Present(record) => record.event_sequence,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }
}

/// Write side of snapshot storage.
pub trait SnapshotWriter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Persist a snapshot record.
    ///
    /// Writes are idempotent by `(aggregate_id, event_sequence)`. Overwriting
    /// with a strictly greater sequence is permitted; a write with a lesser
    /// sequence must be a no-op or a failure.
    ///
    /// # Errors
    ///
    /// Returns a provider-specific error on backend failure.
    fn write_snapshot<'a>(
        &'a self,
        record: &'a SnapshotRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Read side of snapshot storage.
pub trait SnapshotReader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return the highest-sequence snapshot whose `event_sequence` is at most
    /// `up_to_sequence`, or [`SerializedSnapshot::Empty`] if none exists.
    ///
    /// # Errors
    ///
    /// Returns a provider-specific error on backend failure.
    fn read_snapshot<'a>(
        &'a self,
        aggregate_id: AggregateId,
        up_to_sequence: i64,
    ) -> impl Future<Output = Result<SerializedSnapshot, Self::Error>> + Send + 'a;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_sits_at_initial_position() {
        let id = AggregateId::new();
        let snapshot: Snapshot<Vec<u8>> = Snapshot::empty(id);
        assert_eq!(snapshot.commit_sequence, INITIAL_SEQUENCE);
        assert_eq!(snapshot.event_sequence, INITIAL_SEQUENCE);
        assert_eq!(snapshot.partition_key, PartitionKey::from(id));
    }

    #[test]
    fn serialized_empty_reports_initial_sequences() {
        let id = AggregateId::new();
        let raw = SerializedSnapshot::Empty { aggregate_id: id };
        assert!(raw.is_empty());
        assert_eq!(raw.aggregate_id(), id);
        assert_eq!(raw.commit_sequence(), INITIAL_SEQUENCE);
        assert_eq!(raw.event_sequence(), INITIAL_SEQUENCE);
    }

    #[test]
    fn serialized_present_reports_record_position() {
        let id = AggregateId::new();
        let raw = SerializedSnapshot::Present(SnapshotRecord {
            aggregate_id: id,
            partition_key: PartitionKey::from(id),
            commit_sequence: 5,
            event_sequence: 17,
            memento_bytes: b"{}".to_vec(),
        });
        assert!(!raw.is_empty());
        assert_eq!(raw.commit_sequence(), 5);
        assert_eq!(raw.event_sequence(), 17);
    }
}
