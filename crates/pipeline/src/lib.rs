//! Command and query dispatch through composable behaviors.
//!
//! A [`Dispatcher`] routes each message to its [`Pipeline`]: an ordered
//! list of [`Behavior`]s wrapped around one terminal [`Handler`]. Each
//! behavior receives a [`Next`] continuation to the rest of the chain and a
//! per-request [`RequestContext`].
//!
//! The standard behaviors, outermost first:
//! - [`LoggingBehavior`]: tracing and metrics, never alters the result
//! - [`ValidationBehavior`]: short-circuits with failures before any side effect
//! - [`RetryBehavior`]: re-runs the inner chain on conflicts and transient errors
//! - [`TransactionBehavior`]: commit on success, rollback otherwise

pub mod behavior;
pub mod behaviors;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod notification;
pub mod pipeline;
pub mod retry;

pub use behavior::{Behavior, Handler, Next};
pub use behaviors::{
    LoggingBehavior, RetryBehavior, TransactionBehavior, ValidationBehavior, Validator,
};
pub use context::{CORRELATION_ID_KEY, RequestContext};
pub use dispatcher::Dispatcher;
pub use error::{ErrorCategory, PipelineError, Result};
pub use message::{CommandResult, Failure, Message, Outcome, QueryResult};
pub use notification::{DomainNotification, DomainNotifications, NotificationPolicy};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use retry::{Backoff, RetryDecision, RetryStrategy};
