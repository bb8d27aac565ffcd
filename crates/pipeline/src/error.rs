//! Pipeline error types.

use domain::DomainError;
use event_store::EventStoreError;
use thiserror::Error;

/// How a failure should be treated by the retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Optimistic concurrency conflict: reload, re-apply and retry.
    Conflict,

    /// Infrastructure hiccup that may clear on its own.
    Transient,

    /// The request was cancelled by the caller.
    Cancelled,

    /// Anything else. Never retried.
    Permanent,
}

impl ErrorCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Conflict | ErrorCategory::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Permanent => "permanent",
        }
    }
}

/// Failures that propagate out of a pipeline.
///
/// Expected business outcomes (validation failures, notifications, rule
/// violations) travel in the message's output instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Emitting, replaying or persisting an aggregate failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The event store or unit of work failed.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// A failure the handler marked as safe to retry.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The request was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// No pipeline is registered for the message type.
    #[error("No handler registered for {0}")]
    NoHandler(&'static str),

    /// The behavior chain is assembled incorrectly.
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    /// Any other handler failure.
    #[error("Handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Wraps an arbitrary error as a permanent handler failure.
    pub fn handler(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        PipelineError::Handler(error.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Domain(e) if e.is_conflict() => ErrorCategory::Conflict,
            PipelineError::Domain(e) if e.is_transient() => ErrorCategory::Transient,
            PipelineError::EventStore(e) if e.is_conflict() => ErrorCategory::Conflict,
            PipelineError::EventStore(e) if e.is_transient() => ErrorCategory::Transient,
            PipelineError::Transient(_) => ErrorCategory::Transient,
            PipelineError::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::Permanent,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
