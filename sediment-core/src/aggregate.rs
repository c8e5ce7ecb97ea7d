//! The aggregate kernel: an immutable value type enforcing sequence
//! monotonicity and optimistic concurrency.
//!
//! An [`Aggregate`] holds its identity, its position in the commit and event
//! sequences, and a buffer of serialized-but-uncommitted events. Every
//! operation takes `&self` and returns a new value; on failure the caller
//! retains the prior value, so no partial mutation is ever observable.
//!
//! The lifecycle:
//!
//! 1. [`apply_event`](Aggregate::apply_event) validates and appends an event
//!    to the uncommitted buffer (any state -> dirty)
//! 2. [`commit`](Aggregate::commit) packages the buffer as a
//!    [`Commit`] and hands it to an [`EventWriter`] (dirty -> clean;
//!    idempotent no-op when clean)
//! 3. [`apply_commits`](Aggregate::apply_commits) folds validated history
//!    back in during rehydration
//! 4. [`store_snapshot`](Aggregate::store_snapshot) checkpoints committed
//!    state through a [`SnapshotWriter`]
//!
//! Domain state lives in a memento implementing [`Fold`]. Write-only
//! aggregates use [`Discard`], which skips payload decoding entirely during
//! replay and exists only to raise events outward.

use std::{fmt, marker::PhantomData};

use nonempty::NonEmpty;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    codec::{Codec, EventSerializer, SerializationError, SnapshotSerializer},
    commit::{self, Commit, CorruptedHistory},
    event::{AggregateId, Event, INITIAL_SEQUENCE, PartitionKey, SerializedEvent},
    snapshot::{SerializedSnapshot, Snapshot, SnapshotWriter},
    store::{EventWriter, StoredEvent, WriteError},
};

/// Domain state rebuilt by folding events.
///
/// The memento is the in-memory form of aggregate state. It must be
/// default-constructible (the state before any event) and cheap to clone
/// (the kernel's functional updates copy it).
pub trait Fold: Default + Clone {
    /// The payload sum type this memento folds. One closed enum per
    /// aggregate type; the payload type string is the discriminant on
    /// the way back in.
    type Event;

    /// Whether replay decodes and folds payloads.
    ///
    /// Write-only mementos ([`Discard`]) opt out; replay then advances
    /// sequence numbers without touching payload bytes.
    const REPLAYS: bool = true;

    fn fold(&mut self, event: &Self::Event);
}

/// Memento for write-only aggregates: discards every payload.
///
/// Such an aggregate exists to raise events outward and has no read-side
/// state to rebuild, so replay skips deserialization entirely.
pub struct Discard<E>(PhantomData<E>);

impl<E> Default for Discard<E> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<E> Clone for Discard<E> {
    fn clone(&self) -> Self {
        Self(PhantomData)
    }
}

impl<E> Copy for Discard<E> {}

impl<E> fmt::Debug for Discard<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Discard")
    }
}

impl<E> Serialize for Discard<E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_unit()
    }
}

impl<'de, E> Deserialize<'de> for Discard<E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <()>::deserialize(deserializer)?;
        Ok(Self::default())
    }
}

impl<E> Fold for Discard<E> {
    type Event = E;

    const REPLAYS: bool = false;

    fn fold(&mut self, _event: &E) {}
}

/// Error from [`Aggregate::apply_event`].
///
/// Sequence and identity mismatches indicate caller bugs and are not
/// retryable.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("event sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: i64, actual: i64 },
    #[error("event belongs to aggregate {actual}, expected {expected}")]
    AggregateMismatch {
        expected: AggregateId,
        actual: AggregateId,
    },
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Error from replaying stored history into an aggregate.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The provider returned an event out of sequence.
    #[error("event sequence mismatch during replay: expected {expected}, got {actual}")]
    SequenceMismatch { expected: i64, actual: i64 },
    #[error("event belongs to aggregate {actual}, expected {expected}")]
    AggregateMismatch {
        expected: AggregateId,
        actual: AggregateId,
    },
    #[error(transparent)]
    History(#[from] CorruptedHistory),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Error from [`Aggregate::store_snapshot`].
#[derive(Debug, Error)]
pub enum SnapshotError<E>
where
    E: std::error::Error,
{
    /// The aggregate holds uncommitted events; snapshots reflect only
    /// committed history. Commit first.
    #[error("cannot snapshot an aggregate with {count} uncommitted event(s)")]
    UncommittedEvents { count: usize },
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("storage unavailable: {0}")]
    Storage(#[source] E),
}

/// An event-sourced aggregate value.
///
/// Immutable: safe to hand across threads and tasks; all mutations return a
/// new value. Generic over the memento `M` (domain state, [`Fold`]) and the
/// codec `C` used to serialize payloads and mementos.
#[derive(Debug, Clone)]
pub struct Aggregate<M, C> {
    aggregate_id: AggregateId,
    partition_key: PartitionKey,
    commit_sequence: i64,
    event_sequence: i64,
    uncommitted: Vec<SerializedEvent>,
    memento: M,
    events: EventSerializer<C>,
    snapshots: SnapshotSerializer<C>,
}

impl<M, C> Aggregate<M, C>
where
    M: Fold,
    C: Codec + Clone,
{
    /// A fresh aggregate with no history, partitioned by the conventional
    /// key (the identifier's textual form).
    #[must_use]
    pub fn new(aggregate_id: AggregateId, codec: C) -> Self {
        Self::with_partition_key(aggregate_id, PartitionKey::from(aggregate_id), codec)
    }

    /// A fresh aggregate routed to an explicit partition.
    #[must_use]
    pub fn with_partition_key(
        aggregate_id: AggregateId,
        partition_key: PartitionKey,
        codec: C,
    ) -> Self {
        Self {
            aggregate_id,
            partition_key,
            commit_sequence: INITIAL_SEQUENCE,
            event_sequence: INITIAL_SEQUENCE,
            uncommitted: Vec::new(),
            memento: M::default(),
            events: EventSerializer::new(codec.clone()),
            snapshots: SnapshotSerializer::new(codec),
        }
    }

    /// Reconstruct an aggregate from a stored snapshot.
    ///
    /// The empty snapshot yields a value indistinguishable from a freshly
    /// constructed one.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the memento bytes cannot be decoded.
    pub fn rehydrate(raw: &SerializedSnapshot, codec: C) -> Result<Self, SerializationError>
    where
        M: DeserializeOwned,
    {
        let snapshots = SnapshotSerializer::new(codec.clone());
        let snapshot: Snapshot<M> = snapshots.deserialize(raw)?;
        Ok(Self {
            aggregate_id: snapshot.aggregate_id,
            partition_key: snapshot.partition_key,
            commit_sequence: snapshot.commit_sequence,
            event_sequence: snapshot.event_sequence,
            uncommitted: Vec::new(),
            memento: snapshot.memento,
            events: EventSerializer::new(codec),
            snapshots,
        })
    }

    #[must_use]
    pub const fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    #[must_use]
    pub const fn partition_key(&self) -> &PartitionKey {
        &self.partition_key
    }

    /// Index of the last durable commit; `-1` before any commit.
    #[must_use]
    pub const fn commit_sequence(&self) -> i64 {
        self.commit_sequence
    }

    /// Index of the last event, committed or uncommitted; `-1` before any.
    #[must_use]
    pub const fn event_sequence(&self) -> i64 {
        self.event_sequence
    }

    #[must_use]
    pub fn uncommitted(&self) -> &[SerializedEvent] {
        &self.uncommitted
    }

    #[must_use]
    pub const fn memento(&self) -> &M {
        &self.memento
    }

    /// Whether the uncommitted buffer is non-empty.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Validate and append an event, returning the advanced aggregate.
    ///
    /// The event must belong to this aggregate and carry sequence number
    /// `event_sequence() + 1`. The payload is folded into the memento and
    /// serialized into the uncommitted buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::AggregateMismatch`] or
    /// [`ApplyError::SequenceMismatch`] on identity or sequence violations,
    /// [`ApplyError::Serialization`] if the payload cannot be encoded.
    pub fn apply_event(&self, event: &Event<M::Event>) -> Result<Self, ApplyError>
    where
        M::Event: Serialize,
    {
        if event.aggregate_id != self.aggregate_id {
            return Err(ApplyError::AggregateMismatch {
                expected: self.aggregate_id,
                actual: event.aggregate_id,
            });
        }
        let expected = self.event_sequence + 1;
        if event.sequence_number != expected {
            return Err(ApplyError::SequenceMismatch {
                expected,
                actual: event.sequence_number,
            });
        }

        let serialized = self.events.serialize(event)?;
        let mut next = self.clone();
        next.memento.fold(&event.payload);
        next.event_sequence = expected;
        next.uncommitted.push(serialized);
        tracing::trace!(
            aggregate_id = %self.aggregate_id,
            sequence = expected,
            payload_type = %event.payload_type,
            "event applied"
        );
        Ok(next)
    }

    /// Fold a validated commit stream into the aggregate during rehydration.
    ///
    /// Advances the commit sequence by the number of commits and the event
    /// sequence by the total event count. The uncommitted buffer is left
    /// unchanged; rehydration never injects uncommitted state. Mementos with
    /// [`Fold::REPLAYS`] fold each decoded payload; write-only mementos
    /// advance sequences without touching payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::History`] if the stream fails validation
    /// against the current position, or [`ReplayError::Serialization`] if a
    /// payload cannot be decoded.
    pub fn apply_commits(&self, commits: &[Commit]) -> Result<Self, ReplayError>
    where
        M::Event: DeserializeOwned,
    {
        commit::validate_stream(
            self.aggregate_id,
            self.commit_sequence,
            self.event_sequence,
            commits,
        )?;

        let mut next = self.clone();
        for commit in commits {
            if M::REPLAYS {
                for raw in &commit.events {
                    let event: Event<M::Event> = next.events.deserialize(raw)?;
                    next.memento.fold(&event.payload);
                }
            }
            next.commit_sequence = commit.sequence_number;
            next.event_sequence = commit.last_event_sequence();
        }
        tracing::trace!(
            aggregate_id = %self.aggregate_id,
            commits = commits.len(),
            commit_sequence = next.commit_sequence,
            event_sequence = next.event_sequence,
            "commits applied"
        );
        Ok(next)
    }

    /// Fold one stored event into the aggregate. Used by the reader, which
    /// pages flat event streams rather than whole commits.
    pub(crate) fn absorb(&mut self, stored: &StoredEvent) -> Result<(), ReplayError>
    where
        M::Event: DeserializeOwned,
    {
        let raw = &stored.event;
        if raw.aggregate_id != self.aggregate_id {
            return Err(ReplayError::AggregateMismatch {
                expected: self.aggregate_id,
                actual: raw.aggregate_id,
            });
        }
        let expected = self.event_sequence + 1;
        if raw.sequence_number != expected {
            return Err(ReplayError::SequenceMismatch {
                expected,
                actual: raw.sequence_number,
            });
        }
        if stored.commit_sequence < self.commit_sequence {
            return Err(CorruptedHistory::CommitSequenceGap {
                expected: self.commit_sequence,
                actual: stored.commit_sequence,
            }
            .into());
        }

        if M::REPLAYS {
            let event: Event<M::Event> = self.events.deserialize(raw)?;
            self.memento.fold(&event.payload);
        }
        self.event_sequence = expected;
        self.commit_sequence = stored.commit_sequence;
        Ok(())
    }

    /// Persist the uncommitted buffer as a single commit.
    ///
    /// A no-op returning an unchanged value when the buffer is empty.
    /// Otherwise the buffer becomes a [`Commit`] at sequence
    /// `commit_sequence() + 1`, stamped with the current wall clock, and is
    /// handed to the writer. On success the returned aggregate has an
    /// advanced commit sequence and an empty buffer; the event sequence is
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Conflict`] when another writer advanced this
    /// aggregate (reload, re-apply intent, retry), or [`WriteError::Storage`]
    /// on backend failure. Either way the caller's value is untouched.
    pub async fn commit<W>(&self, writer: &W) -> Result<Self, WriteError<W::Error>>
    where
        W: EventWriter,
    {
        let Some(events) = NonEmpty::from_vec(self.uncommitted.clone()) else {
            return Ok(self.clone());
        };

        let commit = Commit {
            aggregate_id: self.aggregate_id,
            partition_key: self.partition_key.clone(),
            sequence_number: self.commit_sequence + 1,
            timestamp_ms: commit::unix_timestamp_ms(),
            events,
        };
        tracing::debug!(
            aggregate_id = %self.aggregate_id,
            sequence = commit.sequence_number,
            events = commit.event_count(),
            "committing"
        );
        writer.write_commit(&commit).await?;

        let mut next = self.clone();
        next.commit_sequence += 1;
        next.uncommitted.clear();
        Ok(next)
    }

    /// Checkpoint the aggregate's committed state through a snapshot writer.
    ///
    /// Snapshots reflect only committed history, so the uncommitted buffer
    /// must be empty; commit first. The engine never writes a snapshot below
    /// the latest committed event sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::UncommittedEvents`] if the buffer is
    /// non-empty, [`SnapshotError::Serialization`] if the memento cannot be
    /// encoded, or [`SnapshotError::Storage`] on backend failure.
    pub async fn store_snapshot<W>(&self, writer: &W) -> Result<(), SnapshotError<W::Error>>
    where
        M: Serialize,
        W: SnapshotWriter,
    {
        if self.is_dirty() {
            return Err(SnapshotError::UncommittedEvents {
                count: self.uncommitted.len(),
            });
        }

        let snapshot = Snapshot {
            aggregate_id: self.aggregate_id,
            partition_key: self.partition_key.clone(),
            commit_sequence: self.commit_sequence,
            event_sequence: self.event_sequence,
            memento: self.memento.clone(),
        };
        let record = self.snapshots.serialize(&snapshot)?;
        tracing::debug!(
            aggregate_id = %self.aggregate_id,
            commit_sequence = self.commit_sequence,
            event_sequence = self.event_sequence,
            "storing snapshot"
        );
        writer
            .write_snapshot(&record)
            .await
            .map_err(SnapshotError::Storage)
    }
}
