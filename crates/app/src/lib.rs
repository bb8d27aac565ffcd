//! Order management wired through the dispatch pipeline.
//!
//! [`build_dispatcher`] registers one pipeline per order command and query.
//! Commands run through logging, validation, retry and transaction
//! behaviors; queries skip the transaction.

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod scenario;
pub mod telemetry;

use std::sync::Arc;

use event_store::{EventStore, TransactionManager};
use pipeline::{Dispatcher, Failure, Handler, Message, Pipeline, Validator};

use crate::commands::*;
use crate::handlers::*;

pub use config::{AppConfig, LogFormat};
pub use error::AppError;

fn validators<M: Message>(validator: fn(&M) -> Vec<Failure>) -> Vec<Arc<dyn Validator<M>>> {
    let validator: Arc<dyn Validator<M>> = Arc::new(validator);
    vec![validator]
}

fn command_pipeline<M: Message>(
    handler: impl Handler<M> + 'static,
    validator: fn(&M) -> Vec<Failure>,
    config: &AppConfig,
    transactions: &Arc<dyn TransactionManager>,
) -> Pipeline<M> {
    Pipeline::builder(handler)
        .logging()
        .validation(validators(validator))
        .retry(config.retry_strategy())
        .transaction(transactions.clone())
        .build()
}

/// Builds the dispatcher with every order command and query registered.
pub fn build_dispatcher(
    config: &AppConfig,
    store: Arc<dyn EventStore>,
    transactions: Arc<dyn TransactionManager>,
) -> Dispatcher {
    let mut dispatcher =
        Dispatcher::new(store).with_notification_policy(config.notification_policy());

    dispatcher
        .register(command_pipeline::<CreateOrder>(
            CreateOrderHandler,
            validate_create_order,
            config,
            &transactions,
        ))
        .register(command_pipeline::<AddLine>(
            AddLineHandler,
            validate_add_line,
            config,
            &transactions,
        ))
        .register(command_pipeline::<ChangeLineQuantity>(
            ChangeLineQuantityHandler,
            validate_change_line_quantity,
            config,
            &transactions,
        ))
        .register(command_pipeline::<RemoveLine>(
            RemoveLineHandler,
            validate_remove_line,
            config,
            &transactions,
        ))
        .register(command_pipeline::<PlaceOrder>(
            PlaceOrderHandler,
            validate_place_order,
            config,
            &transactions,
        ))
        .register(command_pipeline::<CancelOrder>(
            CancelOrderHandler,
            validate_cancel_order,
            config,
            &transactions,
        ))
        .register(
            Pipeline::builder(GetOrderHandler)
                .logging()
                .validation(validators::<GetOrder>(validate_get_order))
                .retry(config.retry_strategy())
                .build(),
        );

    dispatcher
}
