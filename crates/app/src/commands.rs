//! Order commands and queries.

use common::AggregateId;
use domain::{CustomerId, OrderLine, OrderState};
use pipeline::{CommandResult, Failure, Message, QueryResult};
use serde::Serialize;

/// Opens a new order for a customer.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
}

impl CreateOrder {
    /// Creates a command with a freshly generated order ID.
    pub fn for_customer(customer_id: CustomerId) -> Self {
        Self {
            order_id: AggregateId::new(),
            customer_id,
        }
    }
}

/// Adds units of a SKU; an existing line is increased instead.
#[derive(Debug, Clone)]
pub struct AddLine {
    pub order_id: AggregateId,
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct ChangeLineQuantity {
    pub order_id: AggregateId,
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct RemoveLine {
    pub order_id: AggregateId,
    pub sku: String,
}

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub reason: String,
}

/// Reads the current state of an order.
#[derive(Debug, Clone)]
pub struct GetOrder {
    pub order_id: AggregateId,
}

/// Read model returned by [`GetOrder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub id: AggregateId,
    pub version: u64,
    pub customer_id: Option<CustomerId>,
    pub state: OrderState,
    pub lines: Vec<OrderLine>,
    pub total_quantity: u64,
}

macro_rules! command {
    ($($name:ident),+ $(,)?) => {
        $(
            impl Message for $name {
                type Output = CommandResult;

                fn message_type() -> &'static str {
                    stringify!($name)
                }
            }
        )+
    };
}

command!(CreateOrder, AddLine, ChangeLineQuantity, RemoveLine, PlaceOrder, CancelOrder);

impl Message for GetOrder {
    type Output = QueryResult<OrderView>;

    fn message_type() -> &'static str {
        "GetOrder"
    }
}

// Validators. They only look at the message itself; rules that depend on
// aggregate state live on the aggregate.

fn order_id_failure(order_id: &AggregateId) -> Option<Failure> {
    order_id
        .as_str()
        .trim()
        .is_empty()
        .then(|| Failure::new("order_id", "must not be empty"))
}

fn line_failures(order_id: &AggregateId, sku: &str, quantity: u32) -> Vec<Failure> {
    let mut failures: Vec<Failure> = order_id_failure(order_id).into_iter().collect();
    if sku.trim().is_empty() {
        failures.push(Failure::new("sku", "must not be empty"));
    }
    if quantity == 0 {
        failures.push(Failure::new("quantity", "must be greater than 0"));
    }
    failures
}

pub fn validate_create_order(command: &CreateOrder) -> Vec<Failure> {
    let mut failures: Vec<Failure> = order_id_failure(&command.order_id).into_iter().collect();
    if command.customer_id.as_uuid().is_nil() {
        failures.push(Failure::new("customer_id", "must not be nil"));
    }
    failures
}

pub fn validate_add_line(command: &AddLine) -> Vec<Failure> {
    line_failures(&command.order_id, &command.sku, command.quantity)
}

pub fn validate_change_line_quantity(command: &ChangeLineQuantity) -> Vec<Failure> {
    line_failures(&command.order_id, &command.sku, command.quantity)
}

pub fn validate_remove_line(command: &RemoveLine) -> Vec<Failure> {
    let mut failures: Vec<Failure> = order_id_failure(&command.order_id).into_iter().collect();
    if command.sku.trim().is_empty() {
        failures.push(Failure::new("sku", "must not be empty"));
    }
    failures
}

pub fn validate_place_order(command: &PlaceOrder) -> Vec<Failure> {
    order_id_failure(&command.order_id).into_iter().collect()
}

pub fn validate_cancel_order(command: &CancelOrder) -> Vec<Failure> {
    let mut failures: Vec<Failure> = order_id_failure(&command.order_id).into_iter().collect();
    if command.reason.trim().is_empty() {
        failures.push(Failure::new("reason", "must not be empty"));
    }
    failures
}

pub fn validate_get_order(query: &GetOrder) -> Vec<Failure> {
    order_id_failure(&query.order_id).into_iter().collect()
}
