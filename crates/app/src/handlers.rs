//! Terminal handlers for the order commands and queries.

use async_trait::async_trait;
use common::AggregateId;
use domain::{AggregateRoot, Order, OrderError, Sku};
use pipeline::{CommandResult, Handler, PipelineError, QueryResult, RequestContext};

use crate::commands::{
    AddLine, CancelOrder, ChangeLineQuantity, CreateOrder, GetOrder, OrderView, PlaceOrder,
    RemoveLine,
};

/// Splits an [`OrderError`] into the two caller channels: business rule
/// violations become a failed result, everything else propagates.
fn into_result(outcome: Result<(), OrderError>) -> pipeline::Result<CommandResult> {
    match outcome {
        Ok(()) => Ok(CommandResult::ok()),
        Err(OrderError::Domain(error)) => Err(PipelineError::Domain(error)),
        Err(error) => {
            tracing::info!(%error, "Order rule violated");
            Ok(CommandResult::failure(error.to_string()))
        }
    }
}

fn not_found(order_id: &AggregateId) -> CommandResult {
    CommandResult::failure(format!("Order not found: {order_id}"))
}

/// Loads the order, applies `change`, saves on success.
async fn modify_order(
    ctx: &RequestContext,
    order_id: &AggregateId,
    change: impl FnOnce(&mut AggregateRoot<Order>) -> Result<(), OrderError> + Send,
) -> pipeline::Result<CommandResult> {
    let Some(mut order) = ctx.load::<Order>(order_id).await? else {
        return Ok(not_found(order_id));
    };

    let result = into_result(change(&mut order))?;
    if result.success {
        ctx.save(&mut order).await?;
    }
    Ok(result)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOrderHandler;

#[async_trait]
impl Handler<CreateOrder> for CreateOrderHandler {
    #[tracing::instrument(skip_all, fields(order_id = %command.order_id))]
    async fn handle(
        &self,
        ctx: &RequestContext,
        command: &CreateOrder,
    ) -> pipeline::Result<CommandResult> {
        if ctx.load::<Order>(&command.order_id).await?.is_some() {
            return Ok(CommandResult::failure(format!(
                "Order already exists: {}",
                command.order_id
            )));
        }

        let mut order = match AggregateRoot::<Order>::create(
            command.order_id.clone(),
            command.customer_id,
        ) {
            Ok(order) => order,
            Err(error) => return into_result(Err(error)),
        };
        ctx.save(&mut order).await?;
        Ok(CommandResult::ok_with_message(format!(
            "Order {} created",
            command.order_id
        )))
    }
}

/// Adding a SKU already on the order merges the quantities and raises a
/// notification so the caller learns no new line was created. Whether the
/// merge is kept depends on the dispatcher's notification policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddLineHandler;

#[async_trait]
impl Handler<AddLine> for AddLineHandler {
    #[tracing::instrument(skip_all, fields(order_id = %command.order_id, sku = %command.sku))]
    async fn handle(&self, ctx: &RequestContext, command: &AddLine) -> pipeline::Result<CommandResult> {
        let sku = Sku::new(command.sku.clone());
        modify_order(ctx, &command.order_id, |order| {
            if let Some(line) = order.state().line(&sku) {
                ctx.notify(
                    sku.as_str(),
                    format!(
                        "merged into existing line ({} -> {})",
                        line.quantity,
                        line.quantity.saturating_add(command.quantity)
                    ),
                );
            }
            order.add_line(sku.clone(), command.quantity)
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeLineQuantityHandler;

#[async_trait]
impl Handler<ChangeLineQuantity> for ChangeLineQuantityHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        command: &ChangeLineQuantity,
    ) -> pipeline::Result<CommandResult> {
        modify_order(ctx, &command.order_id, |order| {
            order.change_quantity(Sku::new(command.sku.clone()), command.quantity)
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveLineHandler;

#[async_trait]
impl Handler<RemoveLine> for RemoveLineHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        command: &RemoveLine,
    ) -> pipeline::Result<CommandResult> {
        modify_order(ctx, &command.order_id, |order| {
            order.remove_line(Sku::new(command.sku.clone()))
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceOrderHandler;

#[async_trait]
impl Handler<PlaceOrder> for PlaceOrderHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        command: &PlaceOrder,
    ) -> pipeline::Result<CommandResult> {
        modify_order(ctx, &command.order_id, |order| order.place()).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CancelOrderHandler;

#[async_trait]
impl Handler<CancelOrder> for CancelOrderHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        command: &CancelOrder,
    ) -> pipeline::Result<CommandResult> {
        modify_order(ctx, &command.order_id, |order| {
            order.cancel(command.reason.clone())
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetOrderHandler;

#[async_trait]
impl Handler<GetOrder> for GetOrderHandler {
    async fn handle(
        &self,
        ctx: &RequestContext,
        query: &GetOrder,
    ) -> pipeline::Result<QueryResult<OrderView>> {
        let Some(order) = ctx.load::<Order>(&query.order_id).await? else {
            return Ok(QueryResult::not_found());
        };

        let state = order.state();
        Ok(QueryResult::found(OrderView {
            id: order.id().clone(),
            version: order.version().as_u64(),
            customer_id: state.customer_id(),
            state: state.state(),
            lines: state.lines().to_vec(),
            total_quantity: state.total_quantity(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use domain::{CustomerId, OrderState};
    use event_store::{EventStore, InMemoryEventStore, Version};

    async fn context_with_order(id: &str) -> (InMemoryEventStore, RequestContext) {
        let store = InMemoryEventStore::new();
        let ctx = RequestContext::new(Arc::new(store.clone()));
        CreateOrderHandler
            .handle(
                &ctx,
                &CreateOrder {
                    order_id: AggregateId::from(id),
                    customer_id: CustomerId::new(),
                },
            )
            .await
            .unwrap();
        (store, ctx)
    }

    fn add(id: &str, sku: &str, quantity: u32) -> AddLine {
        AddLine {
            order_id: AggregateId::from(id),
            sku: sku.to_string(),
            quantity,
        }
    }

    #[tokio::test]
    async fn create_twice_is_a_business_failure() {
        let (store, ctx) = context_with_order("O1").await;

        let result = CreateOrderHandler
            .handle(
                &ctx,
                &CreateOrder {
                    order_id: AggregateId::from("O1"),
                    customer_id: CustomerId::new(),
                },
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn add_line_to_existing_sku_notifies() {
        let (store, ctx) = context_with_order("O1").await;

        AddLineHandler.handle(&ctx, &add("O1", "sku-7", 2)).await.unwrap();
        assert!(!ctx.notifications().has_any());

        AddLineHandler.handle(&ctx, &add("O1", "sku-7", 3)).await.unwrap();
        let notifications = ctx.notifications().get_all();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].key, "sku-7");

        let version = store.current_version(&AggregateId::from("O1")).await.unwrap();
        assert_eq!(version, Some(Version::new(3)));
    }

    #[tokio::test]
    async fn quantity_overflow_is_a_business_failure() {
        let (store, ctx) = context_with_order("O1").await;
        AddLineHandler
            .handle(&ctx, &add("O1", "sku-7", u32::MAX))
            .await
            .unwrap();

        let result = AddLineHandler
            .handle(&ctx, &add("O1", "sku-7", 1))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.message.unwrap().starts_with("Quantity overflow on sku-7"));
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn rule_violation_saves_nothing() {
        let (store, ctx) = context_with_order("O1").await;

        let result = PlaceOrderHandler
            .handle(
                &ctx,
                &PlaceOrder {
                    order_id: AggregateId::from("O1"),
                },
            )
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Order has no lines"));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (_, ctx) = context_with_order("O1").await;

        let result = RemoveLineHandler
            .handle(
                &ctx,
                &RemoveLine {
                    order_id: AggregateId::from("O9"),
                    sku: "sku-7".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(result.message.as_deref(), Some("Order not found: O9"));

        let query = GetOrderHandler
            .handle(
                &ctx,
                &GetOrder {
                    order_id: AggregateId::from("O9"),
                },
            )
            .await
            .unwrap();
        assert_eq!(query, QueryResult::not_found());
    }

    #[tokio::test]
    async fn get_order_reflects_history() {
        let (_, ctx) = context_with_order("O1").await;
        AddLineHandler.handle(&ctx, &add("O1", "a", 1)).await.unwrap();
        AddLineHandler.handle(&ctx, &add("O1", "b", 4)).await.unwrap();
        CancelOrderHandler
            .handle(
                &ctx,
                &CancelOrder {
                    order_id: AggregateId::from("O1"),
                    reason: "duplicate".to_string(),
                },
            )
            .await
            .unwrap();

        let view = GetOrderHandler
            .handle(
                &ctx,
                &GetOrder {
                    order_id: AggregateId::from("O1"),
                },
            )
            .await
            .unwrap()
            .into_value()
            .unwrap();

        assert_eq!(view.version, 4);
        assert_eq!(view.state, OrderState::Cancelled);
        assert_eq!(view.total_quantity, 5);
    }
}
