use std::sync::Arc;

use async_trait::async_trait;
use event_store::TransactionManager;

use crate::behavior::{Behavior, Next};
use crate::context::RequestContext;
use crate::error::{PipelineError, Result};
use crate::message::{Message, Outcome};

/// Opens a unit of work around the inner chain.
///
/// Commits when the inner chain returns a successful output; rolls back
/// when it errors, returns a failed output, raises notifications under
/// [`NotificationPolicy::FailResult`](crate::NotificationPolicy::FailResult),
/// or the request is cancelled before the commit. Exactly one of the two
/// happens per invocation, so a result reported as failed never leaves a
/// durable write behind.
pub struct TransactionBehavior {
    manager: Arc<dyn TransactionManager>,
}

impl TransactionBehavior {
    pub fn new(manager: Arc<dyn TransactionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl<M: Message> Behavior<M> for TransactionBehavior {
    async fn handle(
        &self,
        ctx: &RequestContext,
        message: &M,
        next: Next<'_, M>,
    ) -> Result<M::Output> {
        ctx.ensure_active()?;
        let unit_of_work = self.manager.begin().await?;
        ctx.enlist(unit_of_work).await?;

        let result = next.run(ctx, message).await;

        let unit_of_work = ctx.take_unit_of_work().await.ok_or_else(|| {
            PipelineError::InvalidPipeline("unit of work released by an inner behavior".to_string())
        })?;

        let succeeded = match &result {
            Ok(output) => !output.is_failure(),
            Err(_) => false,
        };
        let commit = succeeded && !ctx.notifications_fail_outcome();

        if commit && !ctx.cancellation().is_cancelled() {
            unit_of_work.commit().await?;
            tracing::debug!(message_type = M::message_type(), "Unit of work committed");
            return result;
        }

        metrics::counter!("pipeline_rollbacks_total", "message_type" => M::message_type())
            .increment(1);
        if let Err(error) = unit_of_work.rollback().await {
            // The original outcome matters more to the caller than the rollback failure.
            tracing::error!(%error, "Rollback failed");
        }
        tracing::debug!(message_type = M::message_type(), "Unit of work rolled back");

        if commit {
            Err(PipelineError::Cancelled)
        } else {
            result
        }
    }
}
