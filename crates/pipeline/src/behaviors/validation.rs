use std::sync::Arc;

use async_trait::async_trait;

use crate::behavior::{Behavior, Next};
use crate::context::RequestContext;
use crate::error::Result;
use crate::message::{Failure, Message, Outcome};

/// Checks a message before anything downstream runs.
pub trait Validator<M>: Send + Sync {
    /// Returns every failure found; empty means valid.
    fn validate(&self, message: &M) -> Vec<Failure>;
}

impl<M, F> Validator<M> for F
where
    F: Fn(&M) -> Vec<Failure> + Send + Sync,
{
    fn validate(&self, message: &M) -> Vec<Failure> {
        self(message)
    }
}

/// Runs all validators and short-circuits with a failed outcome if any
/// reports a failure. The inner chain is then never invoked.
pub struct ValidationBehavior<M> {
    validators: Vec<Arc<dyn Validator<M>>>,
}

impl<M> ValidationBehavior<M> {
    pub fn new(validators: Vec<Arc<dyn Validator<M>>>) -> Self {
        Self { validators }
    }
}

#[async_trait]
impl<M: Message> Behavior<M> for ValidationBehavior<M> {
    async fn handle(
        &self,
        ctx: &RequestContext,
        message: &M,
        next: Next<'_, M>,
    ) -> Result<M::Output> {
        let failures: Vec<Failure> = self
            .validators
            .iter()
            .flat_map(|validator| validator.validate(message))
            .collect();

        if !failures.is_empty() {
            tracing::warn!(count = failures.len(), ?failures, "Validation failed");
            metrics::counter!(
                "pipeline_validation_failures_total",
                "message_type" => M::message_type()
            )
            .increment(1);
            return Ok(M::Output::from_failures(failures));
        }

        next.run(ctx, message).await
    }
}
