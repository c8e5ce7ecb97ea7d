//! Aggregate rehydration: snapshot read, paged event replay, fold.
//!
//! [`AggregateReader`] combines a [`SnapshotReader`] and an [`EventReader`]
//! to reconstruct an [`Aggregate`] on demand: load the highest usable
//! snapshot, then page the event suffix strictly after it and fold each
//! event in order. Reads can be bounded with
//! [`load_up_to`](AggregateReader::load_up_to) for historical views.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::{
    aggregate::{Aggregate, Fold, ReplayError},
    codec::Codec,
    event::AggregateId,
    snapshot::SnapshotReader,
    store::EventReader,
};

/// Default page size hint handed to the event reader during rehydration.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Error from [`AggregateReader`] loads.
#[derive(Debug, Error)]
pub enum ReadError<SE, EE>
where
    SE: std::error::Error,
    EE: std::error::Error,
{
    #[error("failed to read snapshot: {0}")]
    Snapshot(#[source] SE),
    #[error("failed to read events: {0}")]
    Events(#[source] EE),
    #[error(transparent)]
    Replay(#[from] ReplayError),
}

/// Rehydrates aggregates from a snapshot plus an event-log suffix.
///
/// Construct with the two providers and a codec, then tune with the
/// builder-style setters:
///
/// ```ignore
/// let reader = AggregateReader::new(snapshots, events, JsonCodec)
///     .with_batch_size(250);
/// let list: Aggregate<TodoList, JsonCodec> = reader.load(id).await?;
/// ```
pub struct AggregateReader<SR, ER, C> {
    snapshots: SR,
    events: ER,
    codec: C,
    batch_size: usize,
}

impl<SR, ER, C> AggregateReader<SR, ER, C>
where
    SR: SnapshotReader,
    ER: EventReader,
    C: Codec + Clone,
{
    #[must_use]
    pub const fn new(snapshots: SR, events: ER, codec: C) -> Self {
        Self {
            snapshots,
            events,
            codec,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Page size hint for event replay. Page size never affects the loaded
    /// state, only the number of round trips.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Load an aggregate's full history.
    ///
    /// # Errors
    ///
    /// See [`load_up_to`](Self::load_up_to).
    pub async fn load<M>(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Aggregate<M, C>, ReadError<SR::Error, ER::Error>>
    where
        M: Fold + DeserializeOwned,
        M::Event: DeserializeOwned,
    {
        self.load_up_to(aggregate_id, i64::MAX).await
    }

    /// Load an aggregate's history up to an event sequence bound.
    ///
    /// The returned aggregate satisfies `event_sequence() <= up_to_sequence`
    /// (equal exactly when that many events exist) and holds an empty
    /// uncommitted buffer. Events are folded individually, so a bound that
    /// falls inside a commit stops mid-commit.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Snapshot`] or [`ReadError::Events`] on provider
    /// failure, and [`ReadError::Replay`] when the stream is gapped, belongs
    /// to another aggregate, or cannot be decoded.
    #[tracing::instrument(skip(self), fields(aggregate_id = %aggregate_id))]
    pub async fn load_up_to<M>(
        &self,
        aggregate_id: AggregateId,
        up_to_sequence: i64,
    ) -> Result<Aggregate<M, C>, ReadError<SR::Error, ER::Error>>
    where
        M: Fold + DeserializeOwned,
        M::Event: DeserializeOwned,
    {
        let raw = self
            .snapshots
            .read_snapshot(aggregate_id, up_to_sequence)
            .await
            .map_err(ReadError::Snapshot)?;
        tracing::debug!(
            snapshot_event_sequence = raw.event_sequence(),
            found = !raw.is_empty(),
            "snapshot loaded"
        );

        let mut aggregate =
            Aggregate::rehydrate(&raw, self.codec.clone()).map_err(ReplayError::from)?;
        if aggregate.event_sequence() >= up_to_sequence {
            return Ok(aggregate);
        }

        let mut slice = self
            .events
            .read_events(
                aggregate_id,
                aggregate.event_sequence() + 1,
                up_to_sequence,
                self.batch_size,
            )
            .await
            .map_err(ReadError::Events)?;

        let mut replayed = 0_usize;
        loop {
            for stored in &slice.events {
                aggregate.absorb(stored)?;
            }
            replayed += slice.events.len();

            let Some(token) = slice.continuation else {
                break;
            };
            slice = self
                .events
                .resume(&token)
                .await
                .map_err(ReadError::Events)?;
        }

        tracing::debug!(
            events_replayed = replayed,
            commit_sequence = aggregate.commit_sequence(),
            event_sequence = aggregate.event_sequence(),
            "aggregate loaded"
        );
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_replay_is_transparent() {
        let inner = ReplayError::SequenceMismatch {
            expected: 1,
            actual: 3,
        };
        let message = inner.to_string();
        let err: ReadError<std::io::Error, std::io::Error> = inner.into();
        assert_eq!(err.to_string(), message);
    }
}
