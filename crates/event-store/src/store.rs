use std::sync::Arc;

use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Core trait for event store implementations.
///
/// An event store is append-only: events for an aggregate are written once
/// and read back in version order. It is the single source of truth for
/// optimistic concurrency; the version an in-memory aggregate reports is only
/// advisory until `save` accepts it. All implementations must be thread-safe
/// (Send + Sync) because many command flows share one store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events for one aggregate.
    ///
    /// The batch is written only if the aggregate's persisted version equals
    /// `expected_base_version`; otherwise the call fails with
    /// `ConcurrencyConflict` and nothing is written. Events are appended
    /// atomically - either all succeed or none do.
    ///
    /// Returns the new version of the aggregate after appending.
    async fn save(
        &self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version>;

    /// Retrieves the full history of an aggregate.
    ///
    /// Events are returned in strictly increasing version order starting at
    /// 1. An aggregate that was never created yields an empty vector. A gap
    /// in the stored stream fails with `CorruptEventStream`.
    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Gets the current persisted version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn current_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>>;
}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for Arc<T> {
    async fn save(
        &self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version> {
        (**self).save(events, expected_base_version).await
    }

    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        (**self).load(aggregate_id).await
    }

    async fn current_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        (**self).current_version(aggregate_id).await
    }
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends a single event to the store.
    async fn save_event(&self, event: EventEnvelope, expected_base_version: Version) -> Result<Version> {
        self.save(vec![event], expected_base_version).await
    }

    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.current_version(aggregate_id).await?.is_some())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Validates a batch before it is appended.
///
/// The batch must be non-empty, belong to a single aggregate and aggregate
/// type, start right after `expected_base_version` and be contiguous.
pub fn validate_events_for_append(
    events: &[EventEnvelope],
    expected_base_version: Version,
) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "Cannot append empty event list".to_string(),
        ));
    };

    let mut expected_version = expected_base_version;
    for event in events {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "All events must be for the same aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "All events must have the same aggregate type".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "Event versions must be sequential. Expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}

/// Checks that a loaded stream is contiguous from version 1.
///
/// Every storage backend runs this on `load` so a gap, a duplicate or an
/// event belonging to another aggregate surfaces as `CorruptEventStream`
/// instead of being silently skipped.
pub fn verify_stream(aggregate_id: &AggregateId, events: &[EventEnvelope]) -> Result<()> {
    let mut expected = Version::initial();
    for event in events {
        expected = expected.next();
        if event.aggregate_id != *aggregate_id || event.version != expected {
            return Err(EventStoreError::CorruptEventStream {
                aggregate_id: aggregate_id.clone(),
                expected,
                actual: event.version,
            });
        }
    }
    Ok(())
}
