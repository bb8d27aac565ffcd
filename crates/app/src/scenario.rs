//! The demo order flow run by the `orders` binary.

use common::AggregateId;
use domain::CustomerId;
use futures_util::future::join_all;
use pipeline::{CommandResult, Dispatcher, Message};
use tokio_util::sync::CancellationToken;

use crate::commands::{AddLine, CreateOrder, GetOrder, OrderView, PlaceOrder};
use crate::error::AppError;

/// What the scenario observed.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub order: OrderView,
    /// Concurrent `AddLine` commands that committed.
    pub concurrent_accepted: usize,
    /// Concurrent `AddLine` commands that failed after exhausting retries.
    pub concurrent_rejected: usize,
    /// Result of re-adding an existing SKU. The merge raises a notification,
    /// which under the default policy fails the command and rolls it back.
    pub merge_result: CommandResult,
}

async fn send<M: Message<Output = CommandResult>>(
    dispatcher: &Dispatcher,
    cancellation: &CancellationToken,
    command: M,
) -> Result<CommandResult, AppError> {
    let result = dispatcher
        .dispatch_with_cancellation(command, cancellation.clone())
        .await?;
    Ok(result)
}

fn require_success(step: &str, result: CommandResult) -> Result<CommandResult, AppError> {
    if result.success {
        Ok(result)
    } else {
        Err(AppError::Scenario(format!(
            "{step}: {}",
            result.message.unwrap_or_default()
        )))
    }
}

fn add_line(order_id: &AggregateId, sku: &str, quantity: u32) -> AddLine {
    AddLine {
        order_id: order_id.clone(),
        sku: sku.to_string(),
        quantity,
    }
}

/// Creates an order, adds lines (some concurrently), re-adds an existing
/// SKU, places the order and reads it back.
#[tracing::instrument(skip_all)]
pub async fn run(
    dispatcher: &Dispatcher,
    cancellation: &CancellationToken,
    concurrent_writers: usize,
) -> Result<ScenarioReport, AppError> {
    let create = CreateOrder::for_customer(CustomerId::new());
    let order_id = create.order_id.clone();
    tracing::info!(%order_id, "Creating order");

    require_success(
        "create order",
        send(dispatcher, cancellation, create).await?,
    )?;
    require_success(
        "add first line",
        send(dispatcher, cancellation, add_line(&order_id, "sku-7", 2)).await?,
    )?;

    let writes = (0..concurrent_writers).map(|i| {
        let command = add_line(&order_id, &format!("sku-{}", 100 + i), 1);
        send(dispatcher, cancellation, command)
    });
    let mut concurrent_accepted = 0;
    let mut concurrent_rejected = 0;
    for outcome in join_all(writes).await {
        match outcome {
            Ok(result) if result.success => concurrent_accepted += 1,
            Ok(result) => {
                tracing::warn!(?result, "Concurrent line rejected");
                concurrent_rejected += 1;
            }
            Err(AppError::Pipeline(error)) if error.is_conflict() => {
                tracing::warn!(%error, "Concurrent line gave up after retries");
                concurrent_rejected += 1;
            }
            Err(error) => return Err(error),
        }
    }
    tracing::info!(concurrent_accepted, concurrent_rejected, "Concurrent lines done");

    let merge_result = send(dispatcher, cancellation, add_line(&order_id, "sku-7", 1)).await?;
    tracing::info!(?merge_result, "Existing SKU re-added");

    require_success(
        "place order",
        send(
            dispatcher,
            cancellation,
            PlaceOrder {
                order_id: order_id.clone(),
            },
        )
        .await?,
    )?;

    let order = dispatcher
        .dispatch_with_cancellation(GetOrder { order_id }, cancellation.clone())
        .await?
        .into_value()
        .ok_or_else(|| AppError::Scenario("placed order not found".to_string()))?;

    Ok(ScenarioReport {
        order,
        concurrent_accepted,
        concurrent_rejected,
        merge_result,
    })
}
