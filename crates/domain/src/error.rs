//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

/// Errors raised while emitting, replaying or persisting aggregate events.
///
/// Apart from the wrapped store conflict, every variant is a programming or
/// data-integrity error and must not be retried.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// No applier is registered for the event type.
    #[error("No applier registered on {aggregate_type} for event type {event_type}")]
    MissingApplier {
        aggregate_type: &'static str,
        event_type: String,
    },

    /// The payload does not match the variant its type tag names.
    #[error("Payload of {event_type} does not match its registered applier on {aggregate_type}")]
    EventTypeMismatch {
        aggregate_type: &'static str,
        event_type: String,
    },

    /// A replayed event does not follow the aggregate's current version.
    #[error(
        "Event stream gap for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    EventStreamGap {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// A replayed event belongs to another aggregate.
    #[error("Event for aggregate {actual} replayed into aggregate {expected}")]
    AggregateIdMismatch {
        expected: AggregateId,
        actual: AggregateId,
    },

    /// A stored event was written for another aggregate type.
    #[error("Event stored for aggregate type {actual} loaded as {expected}")]
    AggregateTypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for an optimistic concurrency conflict raised by the store.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }

    /// Returns true when re-running the command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_transient())
    }
}
