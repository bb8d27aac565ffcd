//! Runs the order scenario against the configured event store.

use std::sync::Arc;

use app::{AppConfig, AppError, build_dispatcher, scenario, telemetry};
use event_store::{
    EventStore, InMemoryEventStore, PostgresEventStore, StagedTransactionManager,
    TransactionManager,
};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;

const CONCURRENT_WRITERS: usize = 3;

/// Picks PostgreSQL when `DATABASE_URL` is set, the in-memory store otherwise.
async fn open_store(
    config: &AppConfig,
) -> Result<(Arc<dyn EventStore>, Arc<dyn TransactionManager>), AppError> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await?;
            let store = PostgresEventStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            let transactions = store.transaction_manager();
            Ok((Arc::new(store), Arc::new(transactions)))
        }
        None => {
            let store = InMemoryEventStore::new();
            tracing::info!("using in-memory event store");
            let transactions = StagedTransactionManager::new(store.clone());
            Ok((Arc::new(store), Arc::new(transactions)))
        }
    }
}

/// Cancels `token` on SIGINT.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received SIGINT, cancelling in-flight commands");
                token.cancel();
            }
            Err(error) => tracing::warn!(%error, "failed to install SIGINT handler"),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Configuration and tracing
    let config = AppConfig::from_env();
    telemetry::init_tracing(&config)?;

    // 2. Prometheus metrics recorder
    let metrics_handle = telemetry::install_metrics()?;

    // 3. Event store and dispatcher
    let (store, transactions) = open_store(&config).await?;
    let dispatcher = build_dispatcher(&config, store, transactions);
    tracing::info!(?dispatcher, retry = ?config.retry_strategy(), "dispatcher ready");

    // 4. Scenario
    let cancellation = CancellationToken::new();
    cancel_on_ctrl_c(cancellation.clone());
    let report = scenario::run(&dispatcher, &cancellation, CONCURRENT_WRITERS).await?;

    tracing::info!(
        order_id = %report.order.id,
        version = report.order.version,
        state = %report.order.state,
        lines = report.order.lines.len(),
        total_quantity = report.order.total_quantity,
        concurrent_accepted = report.concurrent_accepted,
        concurrent_rejected = report.concurrent_rejected,
        "scenario finished"
    );
    match serde_json::to_string_pretty(&report.order) {
        Ok(json) => println!("{json}"),
        Err(error) => tracing::warn!(%error, "failed to render order"),
    }

    // 5. Metrics snapshot
    tracing::info!(metrics = %metrics_handle.render(), "metrics snapshot");
    Ok(())
}
