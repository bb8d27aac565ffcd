//! Rehydration of aggregates from the event store.

use common::AggregateId;
use event_store::{EventEnvelope, EventStore};

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::DomainError;
use crate::event::Event;

/// Builds aggregate roots from their stored history.
#[derive(Debug, Clone)]
pub struct AggregateFactory<S> {
    store: S,
}

impl<S: EventStore> AggregateFactory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads and replays the history of `id`.
    ///
    /// Returns `None` when no event was ever stored for `id`, so callers
    /// can tell a creation command apart from a mutation.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn create<A: Aggregate>(
        &self,
        id: &AggregateId,
    ) -> Result<Option<AggregateRoot<A>>, DomainError> {
        let envelopes = self.store.load(id).await?;
        if envelopes.is_empty() {
            tracing::debug!("Aggregate not found");
            return Ok(None);
        }

        metrics::histogram!("aggregate_replay_events", "aggregate_type" => A::aggregate_type())
            .record(envelopes.len() as f64);
        let history = decode_history::<A>(envelopes)?;
        let root = AggregateRoot::rehydrate(id.clone(), history)?;
        tracing::debug!(version = %root.version(), "Aggregate rehydrated");
        Ok(Some(root))
    }
}

/// Decodes stored envelopes into typed events for `A`.
///
/// Fails if an envelope was written for another aggregate type.
pub fn decode_history<A: Aggregate>(
    envelopes: Vec<EventEnvelope>,
) -> Result<Vec<Event<A::Event>>, DomainError> {
    envelopes
        .into_iter()
        .map(|envelope| {
            if envelope.aggregate_type != A::aggregate_type() {
                return Err(DomainError::AggregateTypeMismatch {
                    expected: A::aggregate_type(),
                    actual: envelope.aggregate_type,
                });
            }
            Event::from_envelope(envelope)
        })
        .collect()
}
