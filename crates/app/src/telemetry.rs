//! Tracing subscriber and Prometheus recorder setup.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, LogFormat};
use crate::error::AppError;

/// Installs the global tracing subscriber. `RUST_LOG` syntax is accepted
/// for the level; an unparseable directive falls back to `info`.
pub fn init_tracing(config: &AppConfig) -> Result<(), AppError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = config.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .try_init()?;
    Ok(())
}

/// Installs the global Prometheus recorder and describes the pipeline metrics.
pub fn install_metrics() -> Result<PrometheusHandle, AppError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "pipeline_messages_total",
        "Messages dispatched, by message type and outcome"
    );
    metrics::describe_histogram!(
        "pipeline_duration_seconds",
        metrics::Unit::Seconds,
        "Time spent in the pipeline per message"
    );
    metrics::describe_counter!(
        "pipeline_validation_failures_total",
        "Messages rejected by validation"
    );
    metrics::describe_counter!(
        "pipeline_retries_total",
        "Attempts re-run after a conflict or transient failure"
    );
    metrics::describe_counter!("pipeline_rollbacks_total", "Units of work rolled back");
    metrics::describe_counter!(
        "event_store_conflicts_total",
        "Appends rejected by the optimistic version check"
    );
    metrics::describe_histogram!(
        "aggregate_replay_events",
        metrics::Unit::Count,
        "Events replayed per aggregate load"
    );

    Ok(handle)
}
