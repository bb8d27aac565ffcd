use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A concurrency conflict occurred when appending events.
    /// The expected version did not match the actual version.
    #[error(
        "Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The stored stream for an aggregate is not contiguous.
    #[error(
        "Corrupt event stream for aggregate {aggregate_id}: expected version {expected}, found {actual}"
    )]
    CorruptEventStream {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// The batch handed to `save` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Returns true for an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EventStoreError::ConcurrencyConflict { .. })
    }

    /// Returns true when repeating the operation may succeed.
    ///
    /// Only conflicts and connection-level database failures qualify.
    /// Corrupt streams, malformed batches and serialization errors never do.
    pub fn is_transient(&self) -> bool {
        match self {
            EventStoreError::ConcurrencyConflict { .. } => true,
            EventStoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_transient() {
        let err = EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::from("O1"),
            expected: Version::new(0),
            actual: Version::new(2),
        };
        assert!(err.is_conflict());
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Concurrency conflict for aggregate O1: expected version 0, found 2"
        );
    }

    #[test]
    fn corrupt_stream_is_permanent() {
        let err = EventStoreError::CorruptEventStream {
            aggregate_id: AggregateId::from("O1"),
            expected: Version::new(2),
            actual: Version::new(4),
        };
        assert!(!err.is_conflict());
        assert!(!err.is_transient());
    }

    #[test]
    fn pool_timeout_is_transient() {
        let err = EventStoreError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        assert!(!EventStoreError::Database(sqlx::Error::RowNotFound).is_transient());
    }
}
