//! The atomic unit of persistence and its stream-level invariants.
//!
//! A [`Commit`] batches one or more serialized events and is written
//! atomically by an [`EventWriter`](crate::store::EventWriter). Commits are
//! immutable once written. [`validate_stream`] checks a sequence of commits
//! against an aggregate's current position before they are folded in.

use std::time::{SystemTime, UNIX_EPOCH};

pub use nonempty::NonEmpty;
use thiserror::Error;

use crate::event::{AggregateId, PartitionKey, SerializedEvent};

/// A batch of events persisted atomically.
///
/// Invariants, upheld by the aggregate kernel at construction and checked by
/// [`validate_stream`] on the way back in:
///
/// - `events` is non-empty (type-level, via [`NonEmpty`])
/// - event sequence numbers increase by exactly 1, continuing from the
///   previous commit's last event (0 for the very first commit)
/// - `sequence_number` is the previous commit's plus 1 (0 for the first)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub aggregate_id: AggregateId,
    pub partition_key: PartitionKey,
    pub sequence_number: i64,
    /// Milliseconds since the Unix epoch, stamped at construction.
    pub timestamp_ms: i64,
    pub events: NonEmpty<SerializedEvent>,
}

impl Commit {
    #[must_use]
    pub fn first_event_sequence(&self) -> i64 {
        self.events.first().sequence_number
    }

    #[must_use]
    pub fn last_event_sequence(&self) -> i64 {
        self.events.last().sequence_number
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// A commit stream failed validation against an aggregate's position.
///
/// Surfaced during rehydration; not retryable. A corrupted history requires
/// operator intervention on the underlying store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorruptedHistory {
    #[error("commit stream belongs to aggregate {actual}, expected {expected}")]
    AggregateMismatch {
        expected: AggregateId,
        actual: AggregateId,
    },
    #[error("commit sequence gap: expected {expected}, found {actual}")]
    CommitSequenceGap { expected: i64, actual: i64 },
    #[error("event sequence gap: expected {expected}, found {actual}")]
    EventSequenceGap { expected: i64, actual: i64 },
}

/// Validate a commit stream against an aggregate position.
///
/// Checks, in order: every commit and event belongs to `aggregate_id`;
/// commit sequence numbers continue from `commit_sequence` and increase by
/// exactly 1; event sequence numbers continue from `event_sequence` and
/// increase by exactly 1 across commit boundaries.
///
/// # Errors
///
/// Returns [`CorruptedHistory`] describing the first violation found.
pub fn validate_stream(
    aggregate_id: AggregateId,
    commit_sequence: i64,
    event_sequence: i64,
    commits: &[Commit],
) -> Result<(), CorruptedHistory> {
    let mut next_commit = commit_sequence + 1;
    let mut next_event = event_sequence + 1;

    for commit in commits {
        if commit.aggregate_id != aggregate_id {
            return Err(CorruptedHistory::AggregateMismatch {
                expected: aggregate_id,
                actual: commit.aggregate_id,
            });
        }
        if commit.sequence_number != next_commit {
            return Err(CorruptedHistory::CommitSequenceGap {
                expected: next_commit,
                actual: commit.sequence_number,
            });
        }
        for event in &commit.events {
            if event.aggregate_id != aggregate_id {
                return Err(CorruptedHistory::AggregateMismatch {
                    expected: aggregate_id,
                    actual: event.aggregate_id,
                });
            }
            if event.sequence_number != next_event {
                return Err(CorruptedHistory::EventSequenceGap {
                    expected: next_event,
                    actual: event.sequence_number,
                });
            }
            next_event += 1;
        }
        next_commit += 1;
    }

    Ok(())
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn unix_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
