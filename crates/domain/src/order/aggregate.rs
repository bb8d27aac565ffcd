//! Order aggregate implementation.

use common::AggregateId;

use crate::aggregate::{Aggregate, AggregateRoot, Appliers};

use super::{
    CustomerId, OrderError, OrderEvent, OrderLine, OrderState, Sku,
    events::{
        LineAddedData, LineQuantityChangedData, LineRemovedData, OrderCancelledData,
        OrderCreatedData, OrderPlacedData,
    },
};

/// Order state, folded from [`OrderEvent`]s.
///
/// Lines keep the order in which their SKUs were first added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    customer_id: Option<CustomerId>,
    state: OrderState,
    lines: Vec<OrderLine>,
    cancellation_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn register_appliers(appliers: &mut Appliers<Self>) {
        appliers
            .on(Order::apply_created)
            .on(Order::apply_line_added)
            .on(Order::apply_line_quantity_changed)
            .on(Order::apply_line_removed)
            .on(Order::apply_placed)
            .on(Order::apply_cancelled);
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    /// Returns the current state.
    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Returns the line for `sku`, if any.
    pub fn line(&self, sku: &Sku) -> Option<&OrderLine> {
        self.lines.iter().find(|line| &line.sku == sku)
    }

    /// Returns the total quantity of all lines. Widened so that no number
    /// of `u32` lines can overflow it.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }
}

// Appliers
impl Order {
    fn apply_created(&mut self, data: &OrderCreatedData) {
        self.customer_id = Some(data.customer_id);
        self.state = OrderState::Draft;
    }

    fn apply_line_added(&mut self, data: &LineAddedData) {
        self.lines.push(OrderLine::new(data.sku.clone(), data.quantity));
    }

    fn apply_line_quantity_changed(&mut self, data: &LineQuantityChangedData) {
        if let Some(line) = self.lines.iter_mut().find(|line| line.sku == data.sku) {
            line.quantity = data.new_quantity;
        }
    }

    fn apply_line_removed(&mut self, data: &LineRemovedData) {
        self.lines.retain(|line| line.sku != data.sku);
    }

    fn apply_placed(&mut self, _data: &OrderPlacedData) {
        self.state = OrderState::Placed;
    }

    fn apply_cancelled(&mut self, data: &OrderCancelledData) {
        self.state = OrderState::Cancelled;
        self.cancellation_reason = Some(data.reason.clone());
    }
}

// Business methods. Each validates against current state, then emits.
impl AggregateRoot<Order> {
    /// Creates a new order. Emits `OrderCreated`, so the new root is at version 1.
    pub fn create(id: impl Into<AggregateId>, customer_id: CustomerId) -> Result<Self, OrderError> {
        let mut root = AggregateRoot::new(id);
        root.emit(OrderEvent::OrderCreated(OrderCreatedData { customer_id }))?;
        Ok(root)
    }

    /// Adds `quantity` units of `sku`.
    ///
    /// A SKU already on the order has its line quantity increased instead
    /// of getting a second line.
    pub fn add_line(&mut self, sku: Sku, quantity: u32) -> Result<(), OrderError> {
        self.ensure_modifiable("add line")?;
        validate_line(&sku, quantity)?;

        let event = match self.state().line(&sku) {
            Some(line) => {
                let Some(new_quantity) = line.quantity.checked_add(quantity) else {
                    return Err(OrderError::QuantityOverflow {
                        sku,
                        current: line.quantity,
                        added: quantity,
                    });
                };
                OrderEvent::LineQuantityChanged(LineQuantityChangedData {
                    old_quantity: line.quantity,
                    new_quantity,
                    sku,
                })
            }
            None => OrderEvent::LineAdded(LineAddedData { sku, quantity }),
        };
        self.emit(event)?;
        Ok(())
    }

    /// Sets the quantity of an existing line. Setting the current quantity
    /// emits nothing.
    pub fn change_quantity(&mut self, sku: Sku, quantity: u32) -> Result<(), OrderError> {
        self.ensure_modifiable("change quantity")?;
        validate_line(&sku, quantity)?;

        let old_quantity = self
            .state()
            .line(&sku)
            .map(|line| line.quantity)
            .ok_or_else(|| OrderError::LineNotFound { sku: sku.clone() })?;
        if old_quantity == quantity {
            return Ok(());
        }

        self.emit(OrderEvent::LineQuantityChanged(LineQuantityChangedData {
            sku,
            old_quantity,
            new_quantity: quantity,
        }))?;
        Ok(())
    }

    pub fn remove_line(&mut self, sku: Sku) -> Result<(), OrderError> {
        self.ensure_modifiable("remove line")?;
        if self.state().line(&sku).is_none() {
            return Err(OrderError::LineNotFound { sku });
        }

        self.emit(OrderEvent::LineRemoved(LineRemovedData { sku }))?;
        Ok(())
    }

    /// Places the order. Requires at least one line.
    pub fn place(&mut self) -> Result<(), OrderError> {
        let state = self.state().state();
        if !state.can_place() {
            return Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "place",
            });
        }
        if self.state().lines().is_empty() {
            return Err(OrderError::NoLines);
        }

        let data = OrderPlacedData {
            line_count: self.state().lines().len(),
            total_quantity: self.state().total_quantity(),
        };
        self.emit(OrderEvent::OrderPlaced(data))?;
        Ok(())
    }

    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        let state = self.state().state();
        if !state.can_cancel() {
            return Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "cancel",
            });
        }

        self.emit(OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
        }))?;
        Ok(())
    }

    fn ensure_modifiable(&self, action: &'static str) -> Result<(), OrderError> {
        let state = self.state().state();
        if state.can_modify_lines() {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                current_state: state,
                action,
            })
        }
    }
}

fn validate_line(sku: &Sku, quantity: u32) -> Result<(), OrderError> {
    if sku.is_blank() {
        return Err(OrderError::EmptySku);
    }
    if quantity == 0 {
        return Err(OrderError::InvalidQuantity { quantity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::Version;

    fn draft_order() -> AggregateRoot<Order> {
        AggregateRoot::<Order>::create("O1", CustomerId::new()).unwrap()
    }

    #[test]
    fn create_emits_order_created_at_version_one() {
        let customer = CustomerId::new();
        let order = AggregateRoot::<Order>::create("O1", customer).unwrap();

        assert_eq!(order.version(), Version::first());
        assert_eq!(order.state().customer_id(), Some(customer));
        assert_eq!(order.state().state(), OrderState::Draft);
        assert_eq!(order.uncommitted_events()[0].event_type(), "OrderCreated");
    }

    #[test]
    fn add_line_emits_line_added() {
        let mut order = draft_order();
        order.add_line(Sku::new("sku-7"), 2).unwrap();

        assert_eq!(order.version(), Version::new(2));
        assert_eq!(order.state().lines(), &[OrderLine::new(Sku::new("sku-7"), 2)]);
        assert_eq!(order.uncommitted_events()[1].event_type(), "LineAdded");
    }

    #[test]
    fn adding_existing_sku_changes_quantity() {
        let mut order = draft_order();
        order.add_line(Sku::new("sku-7"), 2).unwrap();
        order.add_line(Sku::new("sku-7"), 3).unwrap();

        assert_eq!(order.state().lines().len(), 1);
        assert_eq!(order.state().total_quantity(), 5);
        assert_eq!(
            order.uncommitted_events()[2].event_type(),
            "LineQuantityChanged"
        );
    }

    #[test]
    fn merging_past_u32_max_is_rejected() {
        let mut order = draft_order();
        order.add_line(Sku::new("sku-7"), u32::MAX).unwrap();

        let err = order.add_line(Sku::new("sku-7"), 1).unwrap_err();

        assert!(matches!(
            err,
            OrderError::QuantityOverflow {
                current: u32::MAX,
                added: 1,
                ..
            }
        ));
        assert!(err.is_business_rule());
        assert_eq!(order.version(), Version::new(2));
        assert_eq!(order.state().line(&Sku::new("sku-7")).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn placing_huge_lines_totals_without_overflow() {
        let mut order = draft_order();
        order.add_line(Sku::new("a"), u32::MAX).unwrap();
        order.add_line(Sku::new("b"), 1).unwrap();

        order.place().unwrap();

        let expected = u64::from(u32::MAX) + 1;
        assert_eq!(order.state().total_quantity(), expected);
        match order.uncommitted_events().last().unwrap().payload() {
            OrderEvent::OrderPlaced(data) => assert_eq!(data.total_quantity, expected),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_quantity_and_blank_sku() {
        let mut order = draft_order();
        assert!(matches!(
            order.add_line(Sku::new("sku-7"), 0),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            order.add_line(Sku::new(" "), 1),
            Err(OrderError::EmptySku)
        ));
        assert_eq!(order.version(), Version::first());
    }

    #[test]
    fn change_quantity_and_remove_line() {
        let mut order = draft_order();
        order.add_line(Sku::new("a"), 1).unwrap();
        order.add_line(Sku::new("b"), 1).unwrap();

        order.change_quantity(Sku::new("a"), 4).unwrap();
        order.change_quantity(Sku::new("a"), 4).unwrap();
        order.remove_line(Sku::new("b")).unwrap();

        assert_eq!(order.version(), Version::new(5));
        assert_eq!(order.state().lines(), &[OrderLine::new(Sku::new("a"), 4)]);
        assert!(matches!(
            order.remove_line(Sku::new("b")),
            Err(OrderError::LineNotFound { .. })
        ));
    }

    #[test]
    fn place_requires_lines() {
        let mut order = draft_order();
        assert!(matches!(order.place(), Err(OrderError::NoLines)));

        order.add_line(Sku::new("a"), 2).unwrap();
        order.place().unwrap();
        assert_eq!(order.state().state(), OrderState::Placed);

        let err = order.add_line(Sku::new("b"), 1).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidStateTransition {
                current_state: OrderState::Placed,
                action: "add line"
            }
        ));
        assert!(err.is_business_rule());
    }

    #[test]
    fn cancel_is_terminal() {
        let mut order = draft_order();
        order.cancel("duplicate").unwrap();

        assert_eq!(order.state().state(), OrderState::Cancelled);
        assert_eq!(order.state().cancellation_reason(), Some("duplicate"));
        assert!(order.cancel("again").is_err());
    }

    #[test]
    fn replay_matches_emitted_state() {
        let mut order = draft_order();
        order.add_line(Sku::new("a"), 1).unwrap();
        order.add_line(Sku::new("a"), 1).unwrap();
        order.add_line(Sku::new("b"), 5).unwrap();
        order.remove_line(Sku::new("b")).unwrap();
        order.place().unwrap();

        let replayed =
            AggregateRoot::<Order>::rehydrate("O1", order.uncommitted_events().to_vec()).unwrap();
        assert_eq!(replayed.state(), order.state());
        assert_eq!(replayed.version(), Version::new(6));
    }
}
