//! Per-request state threaded through every behavior and handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use common::AggregateId;
use domain::{Aggregate, AggregateFactory, AggregateRoot};
use event_store::{EventStore, UnitOfWork, Version};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::notification::{DomainNotification, DomainNotifications, NotificationPolicy};

/// Envelope metadata key carrying the request's correlation id.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// Everything one request needs: store access, the open unit of work,
/// notifications, cancellation and identity.
///
/// Created by the dispatcher for each message and dropped when the
/// pipeline returns. A unit of work still enlisted at that point is
/// dropped with it, which discards its writes.
pub struct RequestContext {
    factory: AggregateFactory<Arc<dyn EventStore>>,
    unit_of_work: Mutex<Option<Box<dyn UnitOfWork>>>,
    notifications: DomainNotifications,
    notification_policy: NotificationPolicy,
    cancellation: CancellationToken,
    correlation_id: Uuid,
    attempt: AtomicU32,
}

impl RequestContext {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            factory: AggregateFactory::new(store),
            unit_of_work: Mutex::new(None),
            notifications: DomainNotifications::new(),
            notification_policy: NotificationPolicy::default(),
            cancellation: CancellationToken::new(),
            correlation_id: Uuid::new_v4(),
            attempt: AtomicU32::new(1),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_notification_policy(mut self, policy: NotificationPolicy) -> Self {
        self.notification_policy = policy;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        self.factory.store()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Fails with [`PipelineError::Cancelled`] once the request is cancelled.
    pub fn ensure_active(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// The current attempt, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Relaxed)
    }

    /// Starts attempt `attempt`: notifications of a rolled-back attempt are dropped.
    pub(crate) fn begin_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Relaxed);
        self.notifications.clear();
    }

    pub fn notifications(&self) -> &DomainNotifications {
        &self.notifications
    }

    pub fn notification_policy(&self) -> NotificationPolicy {
        self.notification_policy
    }

    /// True when the notifications raised so far turn the outcome into a failure.
    pub fn notifications_fail_outcome(&self) -> bool {
        self.notification_policy == NotificationPolicy::FailResult && self.notifications.has_any()
    }

    pub fn notify(&self, key: impl Into<String>, message: impl Into<String>) {
        self.notifications.add(DomainNotification::new(key, message));
    }

    /// Loads and replays an aggregate. `None` if it was never created.
    pub async fn load<A: Aggregate>(&self, id: &AggregateId) -> Result<Option<AggregateRoot<A>>> {
        self.ensure_active()?;
        Ok(self.factory.create::<A>(id).await?)
    }

    /// Persists the buffered events of `root`.
    ///
    /// Inside a transaction the events are staged on the enlisted unit of
    /// work and become durable on commit; otherwise they are saved directly.
    /// Either way the expected base version is the root's committed version.
    pub async fn save<A: Aggregate>(&self, root: &mut AggregateRoot<A>) -> Result<Version> {
        self.ensure_active()?;
        if !root.has_uncommitted_events() {
            return Ok(root.version());
        }

        let mut envelopes = root.uncommitted_envelopes()?;
        let correlation_id = serde_json::Value::String(self.correlation_id.to_string());
        for envelope in &mut envelopes {
            envelope
                .metadata
                .insert(CORRELATION_ID_KEY.to_string(), correlation_id.clone());
        }
        let expected = root.committed_version();

        let version = {
            let mut slot = self.unit_of_work.lock().await;
            match slot.as_mut() {
                Some(unit_of_work) => unit_of_work.stage(envelopes, expected).await?,
                None => self.store().save(envelopes, expected).await?,
            }
        };

        root.mark_changes_as_committed();
        tracing::debug!(aggregate_id = %root.id(), version = %version, "Aggregate saved");
        Ok(version)
    }

    /// Makes `unit_of_work` the target of subsequent saves.
    pub(crate) async fn enlist(&self, unit_of_work: Box<dyn UnitOfWork>) -> Result<()> {
        let mut slot = self.unit_of_work.lock().await;
        if slot.is_some() {
            // Release the newcomer; the outer transaction keeps ownership.
            drop(slot);
            unit_of_work.rollback().await?;
            return Err(PipelineError::InvalidPipeline(
                "a unit of work is already open for this request".to_string(),
            ));
        }
        *slot = Some(unit_of_work);
        Ok(())
    }

    pub(crate) async fn take_unit_of_work(&self) -> Option<Box<dyn UnitOfWork>> {
        self.unit_of_work.lock().await.take()
    }

    pub async fn in_transaction(&self) -> bool {
        self.unit_of_work.lock().await.is_some()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("correlation_id", &self.correlation_id)
            .field("attempt", &self.attempt())
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}
