//! End-to-end order flows through the dispatcher.

use std::sync::Arc;

use app::commands::{AddLine, CancelOrder, CreateOrder, GetOrder, PlaceOrder, RemoveLine};
use app::{AppConfig, AppError, build_dispatcher, scenario};
use common::AggregateId;
use domain::{CustomerId, OrderState};
use event_store::{
    EventStore, InMemoryEventStore, PostgresEventStore, StagedTransactionManager, Version,
};
use pipeline::{Dispatcher, PipelineError};
use tokio_util::sync::CancellationToken;

fn fast_config(max_attempts: u32) -> AppConfig {
    AppConfig {
        retry_max_attempts: max_attempts,
        retry_min_delay_ms: 1,
        retry_max_delay_ms: 5,
        ..AppConfig::default()
    }
}

fn in_memory(config: &AppConfig) -> (InMemoryEventStore, Dispatcher) {
    let store = InMemoryEventStore::new();
    let dispatcher = build_dispatcher(
        config,
        Arc::new(store.clone()),
        Arc::new(StagedTransactionManager::new(store.clone())),
    );
    (store, dispatcher)
}

fn add_line(order_id: &str, sku: &str, quantity: u32) -> AddLine {
    AddLine {
        order_id: AggregateId::from(order_id),
        sku: sku.to_string(),
        quantity,
    }
}

async fn create(dispatcher: &Dispatcher, order_id: &str) {
    let result = dispatcher
        .dispatch(CreateOrder {
            order_id: AggregateId::from(order_id),
            customer_id: CustomerId::new(),
        })
        .await
        .unwrap();
    assert!(result.success, "{result:?}");
}

async fn get(dispatcher: &Dispatcher, order_id: &str) -> app::commands::OrderView {
    dispatcher
        .dispatch(GetOrder {
            order_id: AggregateId::from(order_id),
        })
        .await
        .unwrap()
        .into_value()
        .unwrap()
}

#[tokio::test]
async fn test_every_message_is_registered() {
    let (_, dispatcher) = in_memory(&AppConfig::default());
    assert!(dispatcher.is_registered::<CreateOrder>());
    assert!(dispatcher.is_registered::<AddLine>());
    assert!(dispatcher.is_registered::<RemoveLine>());
    assert!(dispatcher.is_registered::<PlaceOrder>());
    assert!(dispatcher.is_registered::<CancelOrder>());
    assert!(dispatcher.is_registered::<GetOrder>());
}

#[tokio::test]
async fn test_create_and_add_line_reload_at_version_two() {
    let (store, dispatcher) = in_memory(&AppConfig::default());

    create(&dispatcher, "O1").await;
    let result = dispatcher.dispatch(add_line("O1", "sku-7", 2)).await.unwrap();
    assert!(result.success);

    let view = get(&dispatcher, "O1").await;
    assert_eq!(view.version, 2);
    assert_eq!(view.state, OrderState::Draft);
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.lines[0].sku.as_str(), "sku-7");
    assert_eq!(view.lines[0].quantity, 2);
    assert_eq!(
        store.current_version(&AggregateId::from("O1")).await.unwrap(),
        Some(Version::new(2))
    );
}

#[tokio::test]
async fn test_invalid_command_never_touches_the_store() {
    let (store, dispatcher) = in_memory(&AppConfig::default());
    create(&dispatcher, "O1").await;

    let result = dispatcher.dispatch(add_line("O1", "", 0)).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failures.len(), 2);
    assert_eq!(store.event_count().await, 1);
}

#[tokio::test]
async fn test_business_rule_violation_is_a_failed_result() {
    let (store, dispatcher) = in_memory(&AppConfig::default());
    create(&dispatcher, "O1").await;

    let result = dispatcher
        .dispatch(PlaceOrder {
            order_id: AggregateId::from("O1"),
        })
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("Order has no lines"));
    assert_eq!(store.event_count().await, 1);
}

#[tokio::test]
async fn test_notification_fails_result_and_discards_the_write() {
    let (store, dispatcher) = in_memory(&AppConfig::default());
    create(&dispatcher, "O1").await;
    dispatcher.dispatch(add_line("O1", "sku-7", 2)).await.unwrap();

    let result = dispatcher.dispatch(add_line("O1", "sku-7", 1)).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].key, "sku-7");
    assert_eq!(store.event_count().await, 2);
    assert_eq!(get(&dispatcher, "O1").await.total_quantity, 2);

    // Resending the failed command does not double-apply anything.
    dispatcher.dispatch(add_line("O1", "sku-7", 1)).await.unwrap();
    assert_eq!(get(&dispatcher, "O1").await.total_quantity, 2);
}

#[tokio::test]
async fn test_attach_policy_keeps_success() {
    let config = AppConfig {
        notifications_fail_result: false,
        ..AppConfig::default()
    };
    let (_, dispatcher) = in_memory(&config);
    create(&dispatcher, "O1").await;
    dispatcher.dispatch(add_line("O1", "sku-7", 2)).await.unwrap();

    let result = dispatcher.dispatch(add_line("O1", "sku-7", 1)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(get(&dispatcher, "O1").await.total_quantity, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commands_on_one_order_all_commit() {
    const WRITERS: usize = 4;
    let (store, dispatcher) = in_memory(&fast_config(WRITERS as u32));
    let dispatcher = Arc::new(dispatcher);
    create(&dispatcher, "O1").await;

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .dispatch(add_line("O1", &format!("sku-{i}"), 1))
                    .await
            })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.success, "{result:?}");
    }

    let view = get(&dispatcher, "O1").await;
    assert_eq!(view.version, 1 + WRITERS as u64);
    assert_eq!(view.lines.len(), WRITERS);
    assert_eq!(store.event_count().await, 1 + WRITERS);
}

#[tokio::test]
async fn test_scenario_places_the_order() {
    let (_, dispatcher) = in_memory(&fast_config(3));

    let report = scenario::run(&dispatcher, &CancellationToken::new(), 3)
        .await
        .unwrap();

    assert_eq!(report.concurrent_accepted, 3);
    assert_eq!(report.concurrent_rejected, 0);
    assert!(!report.merge_result.success);
    assert_eq!(report.order.state, OrderState::Placed);
    assert_eq!(report.order.lines.len(), 4);
    // The merge raised a notification and was rolled back.
    assert_eq!(report.order.total_quantity, 5);
    // created, sku-7, three concurrent lines, placed
    assert_eq!(report.order.version, 6);
}

#[tokio::test]
async fn test_cancelled_scenario_stops_before_any_write() {
    let (store, dispatcher) = in_memory(&AppConfig::default());
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let error = scenario::run(&dispatcher, &cancellation, 3)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        AppError::Pipeline(PipelineError::Cancelled)
    ));
    assert_eq!(store.event_count().await, 0);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
#[serial_test::serial]
async fn test_scenario_against_postgres() {
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::postgres::Postgres;

    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let pool = sqlx::PgPool::connect(&format!(
        "postgres://postgres:postgres@{host}:{port}/postgres"
    ))
    .await
    .unwrap();

    let store = PostgresEventStore::new(pool);
    store.run_migrations().await.unwrap();
    let config = fast_config(3);
    let dispatcher = build_dispatcher(
        &config,
        Arc::new(store.clone()),
        Arc::new(store.transaction_manager()),
    );

    let report = scenario::run(&dispatcher, &CancellationToken::new(), 3)
        .await
        .unwrap();

    assert_eq!(report.order.state, OrderState::Placed);
    assert_eq!(report.concurrent_accepted, 3);
    assert_eq!(
        store.current_version(&report.order.id).await.unwrap(),
        Some(Version::new(report.order.version))
    );
}
