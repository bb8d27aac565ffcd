use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;

use crate::behavior::{Behavior, Next};
use crate::context::RequestContext;
use crate::error::Result;
use crate::message::{Message, Outcome};

/// Records the message before the call and the outcome or error after it.
///
/// Observes only: the inner result is returned untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBehavior;

#[async_trait]
impl<M: Message> Behavior<M> for LoggingBehavior {
    async fn handle(
        &self,
        ctx: &RequestContext,
        message: &M,
        next: Next<'_, M>,
    ) -> Result<M::Output> {
        let message_type = M::message_type();
        let span = tracing::info_span!(
            "message",
            message_type,
            correlation_id = %ctx.correlation_id()
        );

        async move {
            tracing::debug!(?message, "Handling message");
            let start = Instant::now();

            let result = next.run(ctx, message).await;
            let elapsed = start.elapsed();

            let outcome = match &result {
                Ok(output) if output.is_failure() => {
                    tracing::info!(
                        ?output,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Message failed"
                    );
                    "failure"
                }
                Ok(output) => {
                    tracing::debug!(
                        ?output,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Message handled"
                    );
                    "success"
                }
                Err(error) => {
                    tracing::error!(
                        %error,
                        category = error.category().as_str(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Message faulted"
                    );
                    "error"
                }
            };

            metrics::counter!(
                "pipeline_messages_total",
                "message_type" => message_type,
                "outcome" => outcome
            )
            .increment(1);
            metrics::histogram!("pipeline_duration_seconds", "message_type" => message_type)
                .record(elapsed.as_secs_f64());

            result
        }
        .instrument(span)
        .await
    }
}
