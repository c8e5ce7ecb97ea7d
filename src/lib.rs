#![doc = include_str!("../README.md")]

pub use sediment_core::{
    aggregate,
    aggregate::{Aggregate, ApplyError, Discard, Fold, ReplayError, SnapshotError},
    codec,
    codec::{Codec, EventSerializer, JsonCodec, SerializationError, SnapshotSerializer},
    commit,
    commit::{Commit, CorruptedHistory},
    event,
    event::{AggregateId, Event, INITIAL_SEQUENCE, PartitionKey, Payload, SerializedEvent},
    reader,
    reader::{AggregateReader, ReadError},
    snapshot,
    snapshot::{SerializedSnapshot, Snapshot, SnapshotReader, SnapshotRecord, SnapshotWriter},
    store,
    store::{
        ConcurrencyConflict, ContinuationToken, EventReader, EventSlice, EventWriter, StoredEvent,
        WriteError,
    },
};
