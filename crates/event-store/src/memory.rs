use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, validate_events_for_append, verify_stream},
};

/// In-memory event store implementation.
///
/// Streams are kept per aggregate behind a single write lock, so the version
/// check and the append happen as one step: of two concurrent saves against
/// the same base version exactly one wins.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, Vec<EventEnvelope>>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.streams.read().await.values().map(Vec::len).sum()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.streams.write().await.clear();
    }

    /// Pushes an envelope onto a stream without any version check.
    ///
    /// Stands in for a damaged storage backend when exercising the
    /// corrupt-stream paths.
    pub async fn insert_unchecked(&self, event: EventEnvelope) {
        self.streams
            .write()
            .await
            .entry(event.aggregate_id.clone())
            .or_default()
            .push(event);
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save(
        &self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version> {
        validate_events_for_append(&events, expected_base_version)?;
        let aggregate_id = events[0].aggregate_id.clone();

        let mut streams = self.streams.write().await;
        let stream = streams.entry(aggregate_id.clone()).or_default();

        let current_version = stream
            .last()
            .map(|e| e.version)
            .unwrap_or(Version::initial());

        if current_version != expected_base_version {
            metrics::counter!("event_store_conflicts_total").increment(1);
            tracing::debug!(
                %aggregate_id,
                expected = %expected_base_version,
                actual = %current_version,
                "rejecting append on version mismatch"
            );
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_base_version,
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(expected_base_version);
        stream.extend(events);

        Ok(last_version)
    }

    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        let streams = self.streams.read().await;
        let events = streams.get(aggregate_id).cloned().unwrap_or_default();
        verify_stream(aggregate_id, &events)?;
        Ok(events)
    }

    async fn current_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let streams = self.streams.read().await;
        Ok(streams
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map(|e| e.version))
    }
}
