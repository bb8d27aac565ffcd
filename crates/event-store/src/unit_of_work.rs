//! Transactional boundary around the writes of one command.

use async_trait::async_trait;

use crate::{
    EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, validate_events_for_append},
};

/// The writes of a single command attempt.
///
/// Events are staged while the handler runs and become durable only when
/// the unit of work is committed. `commit` and `rollback` consume the unit of
/// work, so each instance ends exactly once.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Stages a batch for one aggregate, checked against
    /// `expected_base_version`. Returns the aggregate version the batch
    /// reaches.
    ///
    /// Implementations that cannot commit several aggregates atomically
    /// reject a batch for a second aggregate instead of staging it.
    async fn stage(
        &mut self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version>;

    /// Makes every staged batch durable.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged batch.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Opens units of work against a storage backend.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// Begins a fresh unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Transaction manager that buffers staged events in memory and writes them
/// to an [`EventStore`] on commit.
///
/// A unit of work from this manager covers a single aggregate. Batches for
/// that aggregate are merged, so a commit is one version-checked `save` and
/// either lands whole or not at all. Staging events for a second aggregate
/// fails with [`EventStoreError::InvalidAppend`].
#[derive(Debug, Clone, Default)]
pub struct StagedTransactionManager<S> {
    store: S,
}

impl<S> StagedTransactionManager<S>
where
    S: EventStore + Clone + 'static,
{
    /// Creates a transaction manager writing to `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S> TransactionManager for StagedTransactionManager<S>
where
    S: EventStore + Clone + 'static,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(StagedUnitOfWork {
            store: self.store.clone(),
            batches: Vec::new(),
        }))
    }
}

struct StagedBatch {
    expected_base_version: Version,
    events: Vec<EventEnvelope>,
}

impl StagedBatch {
    fn head(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(self.expected_base_version)
    }
}

struct StagedUnitOfWork<S> {
    store: S,
    batches: Vec<StagedBatch>,
}

#[async_trait]
impl<S> UnitOfWork for StagedUnitOfWork<S>
where
    S: EventStore + 'static,
{
    async fn stage(
        &mut self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version> {
        validate_events_for_append(&events, expected_base_version)?;
        let aggregate_id = &events[0].aggregate_id;

        if let Some(batch) = self
            .batches
            .iter_mut()
            .find(|b| b.events[0].aggregate_id == *aggregate_id)
        {
            let head = batch.head();
            if head != expected_base_version {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.clone(),
                    expected: expected_base_version,
                    actual: head,
                });
            }
            batch.events.extend(events);
            return Ok(batch.head());
        }

        if let Some(staged) = self.batches.first() {
            return Err(EventStoreError::InvalidAppend(format!(
                "unit of work already stages {}, cannot also stage {}",
                staged.events[0].aggregate_id, aggregate_id
            )));
        }

        let batch = StagedBatch {
            expected_base_version,
            events,
        };
        let head = batch.head();
        self.batches.push(batch);
        Ok(head)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let StagedUnitOfWork { store, batches } = *self;
        for batch in batches {
            store.save(batch.events, batch.expected_base_version).await?;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!(batches = self.batches.len(), "discarding staged events");
        Ok(())
    }
}
