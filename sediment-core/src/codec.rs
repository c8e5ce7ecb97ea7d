//! Serializer contracts between in-memory values and opaque byte buffers.
//!
//! This module has two layers:
//!
//! - [`Codec`] - the pluggable byte-level contract ([`JsonCodec`] is the
//!   reference implementation backed by `serde_json`)
//! - [`EventSerializer`] / [`SnapshotSerializer`] - typed adapters that apply
//!   a codec to events and snapshots, preserving the engine's sequence
//!   metadata around the opaque payload
//!
//! Codecs are stateless or configuration-only and safe to share across
//! concurrent operations. The round-trip guarantee
//! `deserialize(serialize(x)) == x` must hold for every supported payload
//! shape.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    event::{Event, SerializedEvent},
    snapshot::{SerializedSnapshot, Snapshot, SnapshotRecord},
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error surfaced when a codec cannot encode or decode a value.
///
/// Not retryable; carries the schema discriminant of the value that failed
/// so the offending payload can be investigated.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to encode `{kind}`: {source}")]
    Encode {
        kind: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to decode `{kind}`: {source}")]
    Decode {
        kind: String,
        #[source]
        source: BoxError,
    },
}

impl SerializationError {
    fn encode(kind: &str, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Encode {
            kind: kind.to_string(),
            source: Box::new(err),
        }
    }

    fn decode(kind: &str, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Decode {
            kind: kind.to_string(),
            source: Box::new(err),
        }
    }
}

/// Byte-level serialization strategy.
///
/// Implementations must be cheap to clone; the aggregate kernel and the
/// reader hold one codec per value.
pub trait Codec {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Encode a value to bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec-specific error when encoding fails.
    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize;

    /// Decode a value from bytes.
    ///
    /// # Errors
    ///
    /// Returns a codec-specific error when decoding fails.
    fn deserialize<T>(&self, data: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned;
}

/// JSON codec backed by `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Error = serde_json::Error;

    fn serialize<T>(&self, value: &T) -> Result<Vec<u8>, Self::Error>
    where
        T: Serialize,
    {
        serde_json::to_vec(value)
    }

    fn deserialize<T>(&self, data: &[u8]) -> Result<T, Self::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(data)
    }
}

/// Typed adapter converting between [`Event`] and [`SerializedEvent`].
#[derive(Clone, Copy, Debug, Default)]
pub struct EventSerializer<C> {
    codec: C,
}

impl<C: Codec> EventSerializer<C> {
    #[must_use]
    pub const fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Encode an event's payload, keeping the sequence metadata alongside.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Encode`] when the payload cannot be
    /// encoded.
    pub fn serialize<P>(&self, event: &Event<P>) -> Result<SerializedEvent, SerializationError>
    where
        P: Serialize,
    {
        let payload_bytes = self
            .codec
            .serialize(&event.payload)
            .map_err(|e| SerializationError::encode(&event.payload_type, e))?;
        Ok(SerializedEvent {
            aggregate_id: event.aggregate_id,
            sequence_number: event.sequence_number,
            payload_type: event.payload_type.clone(),
            payload_bytes,
        })
    }

    /// Decode a stored event back to its typed form.
    ///
    /// The per-event timestamp is not persisted, so the decoded event carries
    /// none; all other fields round-trip exactly.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Decode`] when the payload bytes do not
    /// match the expected shape.
    pub fn deserialize<P>(&self, raw: &SerializedEvent) -> Result<Event<P>, SerializationError>
    where
        P: DeserializeOwned,
    {
        let payload = self
            .codec
            .deserialize(&raw.payload_bytes)
            .map_err(|e| SerializationError::decode(&raw.payload_type, e))?;
        Ok(Event {
            aggregate_id: raw.aggregate_id,
            sequence_number: raw.sequence_number,
            payload,
            payload_type: raw.payload_type.clone(),
            timestamp_ms: None,
        })
    }
}

/// Typed adapter converting between [`Snapshot`] and [`SerializedSnapshot`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SnapshotSerializer<C> {
    codec: C,
}

impl<C: Codec> SnapshotSerializer<C> {
    #[must_use]
    pub const fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Encode a snapshot's memento into a storable record.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Encode`] when the memento cannot be
    /// encoded.
    pub fn serialize<M>(&self, snapshot: &Snapshot<M>) -> Result<SnapshotRecord, SerializationError>
    where
        M: Serialize,
    {
        let memento_bytes = self
            .codec
            .serialize(&snapshot.memento)
            .map_err(|e| SerializationError::encode("snapshot memento", e))?;
        Ok(SnapshotRecord {
            aggregate_id: snapshot.aggregate_id,
            partition_key: snapshot.partition_key.clone(),
            commit_sequence: snapshot.commit_sequence,
            event_sequence: snapshot.event_sequence,
            memento_bytes,
        })
    }

    /// Decode a stored snapshot back to its typed form.
    ///
    /// An [`Empty`](SerializedSnapshot::Empty) input yields a snapshot at
    /// sequence `(-1, -1)` with a default-constructed memento and the
    /// conventional partition key.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Decode`] when the memento bytes do not
    /// match the expected shape.
    pub fn deserialize<M>(
        &self,
        raw: &SerializedSnapshot,
    ) -> Result<Snapshot<M>, SerializationError>
    where
        M: Default + DeserializeOwned,
    {
        match raw {
            SerializedSnapshot::Empty { aggregate_id } => Ok(Snapshot::empty(*aggregate_id)),
            SerializedSnapshot::Present(record) => {
                let memento = self
                    .codec
                    .deserialize(&record.memento_bytes)
                    .map_err(|e| SerializationError::decode("snapshot memento", e))?;
                Ok(Snapshot {
                    aggregate_id: record.aggregate_id,
                    partition_key: record.partition_key.clone(),
                    commit_sequence: record.commit_sequence,
                    event_sequence: record.event_sequence,
                    memento,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::event::{AggregateId, INITIAL_SEQUENCE, Payload, PartitionKey};

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    struct ItemAdded {
        id: String,
        title: String,
    }

    impl Payload for ItemAdded {
        fn payload_type(&self) -> &'static str {
            "item-added"
        }
    }

    #[test]
    fn json_codec_roundtrips() {
        let codec = JsonCodec;
        let value = ItemAdded {
            id: "a".to_string(),
            title: "t".to_string(),
        };
        let bytes = codec.serialize(&value).unwrap();
        let decoded: ItemAdded = codec.deserialize(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn json_codec_rejects_invalid_bytes() {
        let codec = JsonCodec;
        let result: Result<ItemAdded, _> = codec.deserialize(b"not valid json");
        assert!(result.is_err());
    }

    #[test]
    fn event_serializer_roundtrips() {
        let serializer = EventSerializer::new(JsonCodec);
        let event = Event::new(
            AggregateId::new(),
            0,
            ItemAdded {
                id: "a".to_string(),
                title: "t".to_string(),
            },
        );

        let raw = serializer.serialize(&event).unwrap();
        assert_eq!(raw.payload_type, "item-added");
        assert_eq!(raw.sequence_number, 0);

        let decoded: Event<ItemAdded> = serializer.deserialize(&raw).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn event_decode_error_names_payload_type() {
        let serializer = EventSerializer::new(JsonCodec);
        let raw = SerializedEvent {
            aggregate_id: AggregateId::new(),
            sequence_number: 0,
            payload_type: "item-added".to_string(),
            payload_bytes: b"garbage".to_vec(),
        };
        let err = serializer.deserialize::<ItemAdded>(&raw).unwrap_err();
        assert!(err.to_string().contains("item-added"));
    }

    #[test]
    fn snapshot_serializer_roundtrips() {
        let serializer = SnapshotSerializer::new(JsonCodec);
        let id = AggregateId::new();
        let snapshot = Snapshot {
            aggregate_id: id,
            partition_key: PartitionKey::from(id),
            commit_sequence: 5,
            event_sequence: 17,
            memento: vec!["a".to_string(), "b".to_string()],
        };

        let record = serializer.serialize(&snapshot).unwrap();
        let decoded: Snapshot<Vec<String>> = serializer
            .deserialize(&SerializedSnapshot::Present(record))
            .unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn empty_snapshot_deserializes_to_defaults() {
        let serializer = SnapshotSerializer::new(JsonCodec);
        let id = AggregateId::new();
        let snapshot: Snapshot<Vec<String>> = serializer
            .deserialize(&SerializedSnapshot::Empty { aggregate_id: id })
            .unwrap();

        assert_eq!(snapshot.aggregate_id, id);
        assert_eq!(snapshot.partition_key, PartitionKey::from(id));
        assert_eq!(snapshot.commit_sequence, INITIAL_SEQUENCE);
        assert_eq!(snapshot.event_sequence, INITIAL_SEQUENCE);
        assert!(snapshot.memento.is_empty());
    }
}
