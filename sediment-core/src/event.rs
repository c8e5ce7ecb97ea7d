//! Identifiers and event value types.
//!
//! This module defines the identity of an aggregate ([`AggregateId`],
//! [`PartitionKey`]) and the two forms an event takes on its way to storage:
//! the typed [`Event`] produced by domain code, and the [`SerializedEvent`]
//! produced by the codec layer and carried inside commits.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Sequence position of an aggregate before any event or commit exists.
///
/// Both the commit sequence and the event sequence of a freshly constructed
/// aggregate start here and advance monotonically from it.
pub const INITIAL_SEQUENCE: i64 = -1;

/// Opaque 128-bit aggregate identifier.
///
/// Backed by a UUID; new identifiers are random (v4). The identifier is the
/// stream key for every commit, event and snapshot belonging to an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AggregateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for AggregateId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Error returned when constructing a [`PartitionKey`] from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("partition key must not be empty")]
pub struct EmptyPartitionKey;

/// Non-empty string routing an aggregate to a storage partition.
///
/// By convention this is the textual form of the [`AggregateId`] unless the
/// caller chooses otherwise. The key is fixed for the lifetime of an
/// aggregate; every commit and snapshot carries it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKey(String);

impl PartitionKey {
    /// Create a partition key from a non-empty string.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyPartitionKey`] if the string is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, EmptyPartitionKey> {
        let key = key.into();
        if key.is_empty() {
            return Err(EmptyPartitionKey);
        }
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<AggregateId> for PartitionKey {
    /// The conventional partition key: the identifier's textual form.
    fn from(id: AggregateId) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marker trait for domain payloads persisted by the engine.
///
/// The discriminant returned by [`payload_type`](Payload::payload_type) is
/// stored alongside the encoded bytes and drives dispatch when domain code
/// decodes events during replay. Payloads are typically closed enums, one
/// per aggregate type, returning a distinct discriminant per variant.
pub trait Payload {
    fn payload_type(&self) -> &'static str;
}

/// A typed domain event, not yet serialized.
///
/// The sequence number must equal the owning aggregate's event sequence plus
/// one at the moment of application; [`Aggregate::apply_event`] enforces this.
///
/// [`Aggregate::apply_event`]: crate::aggregate::Aggregate::apply_event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event<P> {
    pub aggregate_id: AggregateId,
    pub sequence_number: i64,
    pub payload: P,
    /// Schema discriminant for `payload`; see [`Payload`].
    pub payload_type: String,
    /// Optional wall-clock annotation. Not persisted; durable timestamps
    /// live on the commit.
    pub timestamp_ms: Option<i64>,
}

impl<P: Payload> Event<P> {
    /// Create an event, deriving the payload type from the payload itself.
    #[must_use]
    pub fn new(aggregate_id: AggregateId, sequence_number: i64, payload: P) -> Self {
        let payload_type = payload.payload_type().to_owned();
        Self {
            aggregate_id,
            sequence_number,
            payload,
            payload_type,
            timestamp_ms: None,
        }
    }
}

/// An event in its storage form: opaque payload bytes plus the metadata the
/// engine needs to validate and order it.
///
/// Produced from an [`Event`] by the codec layer
/// ([`EventSerializer`](crate::codec::EventSerializer)); carried inside
/// [`Commit`](crate::commit::Commit)s and handed to storage providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedEvent {
    pub aggregate_id: AggregateId,
    pub sequence_number: i64,
    pub payload_type: String,
    pub payload_bytes: Vec<u8>,
}
