use std::time::Instant;

use async_trait::async_trait;

use crate::behavior::{Behavior, Next};
use crate::context::RequestContext;
use crate::error::{PipelineError, Result};
use crate::message::Message;
use crate::retry::{RetryDecision, RetryStrategy};

/// Re-runs the inner chain while the [`RetryStrategy`] allows it.
///
/// Every attempt re-enters the whole inner segment, so a transaction
/// behavior inside opens a fresh unit of work each time. Cancellation
/// aborts a pending wait immediately.
#[derive(Debug, Clone)]
pub struct RetryBehavior {
    strategy: RetryStrategy,
}

impl RetryBehavior {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }
}

#[async_trait]
impl<M: Message> Behavior<M> for RetryBehavior {
    async fn handle(
        &self,
        ctx: &RequestContext,
        message: &M,
        next: Next<'_, M>,
    ) -> Result<M::Output> {
        let started = Instant::now();
        let mut attempt = 1;

        loop {
            ctx.ensure_active()?;
            ctx.begin_attempt(attempt);

            let error = match next.run(ctx, message).await {
                Ok(output) => return Ok(output),
                Err(error) => error,
            };

            let delay = match self.strategy.decide(&error, started.elapsed(), attempt) {
                RetryDecision::NoRetry => {
                    if attempt > 1 {
                        tracing::warn!(attempt, %error, "Giving up after retries");
                    }
                    return Err(error);
                }
                RetryDecision::RetryAfter(delay) => delay,
            };

            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                category = error.category().as_str(),
                %error,
                "Attempt failed, retrying"
            );
            metrics::counter!("pipeline_retries_total", "message_type" => M::message_type())
                .increment(1);

            tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}
