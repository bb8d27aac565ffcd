//! Routing of messages to their pipelines.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::context::RequestContext;
use crate::error::{PipelineError, Result};
use crate::message::{Message, Outcome};
use crate::notification::NotificationPolicy;
use crate::pipeline::Pipeline;

/// Registry of one pipeline per message type, assembled at startup.
///
/// Each dispatch gets its own [`RequestContext`]; nothing request-scoped
/// is shared between concurrent dispatches.
pub struct Dispatcher {
    store: Arc<dyn EventStore>,
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    notification_policy: NotificationPolicy,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            pipelines: HashMap::new(),
            notification_policy: NotificationPolicy::default(),
        }
    }

    pub fn with_notification_policy(mut self, policy: NotificationPolicy) -> Self {
        self.notification_policy = policy;
        self
    }

    /// Registers the pipeline for `M`.
    ///
    /// # Panics
    ///
    /// Panics if `M` already has a pipeline.
    pub fn register<M: Message>(&mut self, pipeline: Pipeline<M>) -> &mut Self {
        let previous = self
            .pipelines
            .insert(TypeId::of::<M>(), Box::new(pipeline));
        assert!(
            previous.is_none(),
            "pipeline for {} registered twice",
            M::message_type()
        );
        tracing::debug!(message_type = M::message_type(), "Pipeline registered");
        self
    }

    pub fn is_registered<M: Message>(&self) -> bool {
        self.pipelines.contains_key(&TypeId::of::<M>())
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub async fn dispatch<M: Message>(&self, message: M) -> Result<M::Output> {
        self.dispatch_with_cancellation(message, CancellationToken::new())
            .await
    }

    /// Runs `message` through its pipeline and folds leftover domain
    /// notifications into the output according to the notification policy.
    ///
    /// Expected outcomes come back as `Ok`; an `Err` is always an
    /// unexpected, fatal or exhausted-retry failure.
    pub async fn dispatch_with_cancellation<M: Message>(
        &self,
        message: M,
        cancellation: CancellationToken,
    ) -> Result<M::Output> {
        let pipeline = self
            .pipelines
            .get(&TypeId::of::<M>())
            .and_then(|pipeline| pipeline.downcast_ref::<Pipeline<M>>())
            .ok_or(PipelineError::NoHandler(M::message_type()))?;

        let ctx = RequestContext::new(self.store.clone())
            .with_cancellation(cancellation)
            .with_notification_policy(self.notification_policy);
        ctx.ensure_active()?;

        let output = pipeline.execute(&ctx, &message).await?;

        let notifications = ctx.notifications().take();
        if notifications.is_empty() {
            return Ok(output);
        }
        tracing::info!(
            message_type = M::message_type(),
            count = notifications.len(),
            policy = ?self.notification_policy,
            "Domain notifications raised"
        );
        Ok(output.with_notifications(notifications, self.notification_policy))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pipelines", &self.pipelines.len())
            .field("notification_policy", &self.notification_policy)
            .finish_non_exhaustive()
    }
}
