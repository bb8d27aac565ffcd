//! Loading and saving aggregates against an event store.

use common::AggregateId;
use event_store::{EventStore, Version};

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::error::DomainError;
use crate::factory::AggregateFactory;

/// Loads aggregates through an [`AggregateFactory`] and persists their
/// uncommitted events with an optimistic version check.
#[derive(Debug, Clone)]
pub struct AggregateRepository<S> {
    factory: AggregateFactory<S>,
}

impl<S: EventStore> AggregateRepository<S> {
    /// Creates a new repository with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            factory: AggregateFactory::new(store),
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        self.factory.store()
    }

    pub fn factory(&self) -> &AggregateFactory<S> {
        &self.factory
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load<A: Aggregate>(
        &self,
        id: &AggregateId,
    ) -> Result<Option<AggregateRoot<A>>, DomainError> {
        self.factory.create(id).await
    }

    /// Persists the buffered events of `root` and clears its buffer.
    ///
    /// The save is checked against [`AggregateRoot::committed_version`]; on
    /// conflict the buffer is kept so the caller can inspect it. A root
    /// with nothing buffered is left untouched.
    #[tracing::instrument(skip(self, root), fields(aggregate_id = %root.id()))]
    pub async fn save<A: Aggregate>(
        &self,
        root: &mut AggregateRoot<A>,
    ) -> Result<Version, DomainError> {
        if !root.has_uncommitted_events() {
            return Ok(root.version());
        }

        let envelopes = root.uncommitted_envelopes()?;
        let version = self
            .store()
            .save(envelopes, root.committed_version())
            .await?;
        root.mark_changes_as_committed();

        tracing::debug!(version = %version, "Aggregate saved");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{CustomerId, Order, Sku};
    use event_store::InMemoryEventStore;

    #[tokio::test]
    async fn save_persists_and_clears_buffer() {
        let store = InMemoryEventStore::new();
        let repository = AggregateRepository::new(store.clone());

        let mut order = AggregateRoot::<Order>::create("O1", CustomerId::new()).unwrap();
        let version = repository.save(&mut order).await.unwrap();

        assert_eq!(version, Version::first());
        assert!(!order.has_uncommitted_events());
        assert_eq!(store.event_count().await, 1);

        order.add_line(Sku::new("sku-1"), 3).unwrap();
        let version = repository.save(&mut order).await.unwrap();
        assert_eq!(version, Version::new(2));
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn save_without_changes_is_noop() {
        let store = InMemoryEventStore::new();
        let repository = AggregateRepository::new(store.clone());

        let mut order = AggregateRoot::<Order>::create("O1", CustomerId::new()).unwrap();
        repository.save(&mut order).await.unwrap();

        let version = repository.save(&mut order).await.unwrap();
        assert_eq!(version, Version::first());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn stale_save_conflicts_and_keeps_buffer() {
        let repository = AggregateRepository::new(InMemoryEventStore::new());

        let mut order = AggregateRoot::<Order>::create("O1", CustomerId::new()).unwrap();
        repository.save(&mut order).await.unwrap();

        let mut first = repository
            .load::<Order>(&AggregateId::from("O1"))
            .await
            .unwrap()
            .unwrap();
        let mut second = repository
            .load::<Order>(&AggregateId::from("O1"))
            .await
            .unwrap()
            .unwrap();

        first.add_line(Sku::new("a"), 1).unwrap();
        second.add_line(Sku::new("b"), 1).unwrap();

        repository.save(&mut first).await.unwrap();
        let err = repository.save(&mut second).await.unwrap_err();

        assert!(err.is_conflict());
        assert!(second.has_uncommitted_events());
    }
}
