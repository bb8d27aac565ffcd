//! Order aggregate and related types.

mod aggregate;
mod events;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use events::{
    LineAddedData, LineQuantityChangedData, LineRemovedData, OrderCancelledData,
    OrderCreatedData, OrderEvent, OrderPlacedData,
};
pub use state::OrderState;
pub use value_objects::{CustomerId, OrderLine, Sku};

use thiserror::Error;

use crate::error::DomainError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    /// Line not found in order.
    #[error("Line not found: {sku}")]
    LineNotFound { sku: Sku },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// SKU is blank.
    #[error("SKU must not be empty")]
    EmptySku,

    /// Adding to a line would exceed the largest representable quantity.
    #[error("Quantity overflow on {sku}: {current} + {added} exceeds {max}", max = u32::MAX)]
    QuantityOverflow { sku: Sku, current: u32, added: u32 },

    /// Order has no lines.
    #[error("Order has no lines")]
    NoLines,

    /// Emitting or replaying an event failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl OrderError {
    /// Returns true for rule violations the caller can correct, as opposed
    /// to wrapped infrastructure or programming errors.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, OrderError::Domain(_))
    }
}
