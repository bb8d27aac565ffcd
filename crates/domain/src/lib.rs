//! Event-sourced aggregate model.
//!
//! This crate provides:
//! - [`DomainEvent`] and [`Event`] with its [`EventMetadata`]
//! - [`Aggregate`] state folded by an explicit [`Appliers`] registry
//! - [`AggregateRoot`] with its version counter and uncommitted-event buffer
//! - [`AggregateFactory`] and [`AggregateRepository`] over any event store
//! - the [`order`] aggregate

pub mod aggregate;
pub mod error;
pub mod event;
pub mod factory;
pub mod order;
pub mod repository;

pub use aggregate::{Aggregate, AggregateRoot, Appliers};
pub use error::DomainError;
pub use event::{DomainEvent, Event, EventMetadata, EventPayload};
pub use factory::{AggregateFactory, decode_history};
pub use order::{
    CustomerId, Order, OrderError, OrderEvent, OrderLine, OrderState, Sku,
};
pub use repository::AggregateRepository;
