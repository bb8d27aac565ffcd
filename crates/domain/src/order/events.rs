//! Order domain events.

use serde::{Deserialize, Serialize};

use super::{CustomerId, Sku};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created.
    OrderCreated(OrderCreatedData),

    /// A new line was added.
    LineAdded(LineAddedData),

    /// The quantity of an existing line changed.
    LineQuantityChanged(LineQuantityChangedData),

    /// A line was removed.
    LineRemoved(LineRemovedData),

    /// Order was placed.
    OrderPlaced(OrderPlacedData),

    /// Order was cancelled.
    OrderCancelled(OrderCancelledData),
}

crate::event_variants!(OrderEvent {
    OrderCreated(OrderCreatedData),
    LineAdded(LineAddedData),
    LineQuantityChanged(LineQuantityChangedData),
    LineRemoved(LineRemovedData),
    OrderPlaced(OrderPlacedData),
    OrderCancelled(OrderCancelledData),
});

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    /// The customer who owns the order.
    pub customer_id: CustomerId,
}

/// Data for LineAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAddedData {
    pub sku: Sku,
    pub quantity: u32,
}

/// Data for LineQuantityChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineQuantityChangedData {
    pub sku: Sku,

    /// Previous quantity.
    pub old_quantity: u32,

    /// New quantity.
    pub new_quantity: u32,
}

/// Data for LineRemoved event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRemovedData {
    pub sku: Sku,
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    /// Number of lines at placement time.
    pub line_count: usize,

    /// Total units across all lines.
    pub total_quantity: u64,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
}
