//! Application-level errors.

use event_store::EventStoreError;
use metrics_exporter_prometheus::BuildError;
use pipeline::PipelineError;
use thiserror::Error;

/// Errors that abort the binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to connect to the database: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error("Scenario step failed: {0}")]
    Scenario(String),
}
