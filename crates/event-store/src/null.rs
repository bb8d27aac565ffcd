use async_trait::async_trait;

use crate::{
    AggregateId, EventEnvelope, Result, Version,
    store::{EventStore, validate_events_for_append},
};

/// Event store that discards everything it is given.
///
/// Used when event persistence is disabled. Saves still validate the batch
/// shape but never report a conflict; loads always come back empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventStore;

impl NullEventStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventStore for NullEventStore {
    async fn save(
        &self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version> {
        validate_events_for_append(&events, expected_base_version)?;
        tracing::trace!(count = events.len(), "discarding events");
        Ok(events
            .last()
            .map(|e| e.version)
            .unwrap_or(expected_base_version))
    }

    async fn load(&self, _aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        Ok(Vec::new())
    }

    async fn current_version(&self, _aggregate_id: &AggregateId) -> Result<Option<Version>> {
        Ok(None)
    }
}
