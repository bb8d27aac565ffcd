//! Append-only event storage.
//!
//! Provides the persisted event envelope, the [`EventStore`] contract with
//! optimistic concurrency, in-memory, no-op and PostgreSQL backends, and the
//! [`UnitOfWork`] boundary that commits or rolls back the writes of one
//! command.

pub mod error;
pub mod event;
pub mod memory;
pub mod null;
pub mod postgres;
pub mod store;
pub mod unit_of_work;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventId, Version};
pub use memory::InMemoryEventStore;
pub use null::NullEventStore;
pub use postgres::{PostgresEventStore, PostgresTransactionManager};
pub use store::{EventStore, EventStoreExt, validate_events_for_append, verify_stream};
pub use unit_of_work::{StagedTransactionManager, TransactionManager, UnitOfWork};
