//! Non-fatal business observations collected while a request runs.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// A soft business-rule violation: worth reporting, not worth aborting for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNotification {
    pub key: String,
    pub message: String,
}

impl DomainNotification {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// What the dispatcher does with notifications left over after the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPolicy {
    /// Any notification turns the output into a failure, and a transaction
    /// around the handler rolls back instead of committing.
    #[default]
    FailResult,

    /// Notifications are attached to the output, which keeps its status.
    Attach,
}

/// Per-request notification collector.
///
/// Shared by reference between behaviors and the handler of one request.
/// Never shared across requests.
#[derive(Debug, Default)]
pub struct DomainNotifications {
    items: Mutex<Vec<DomainNotification>>,
}

impl DomainNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, Vec<DomainNotification>> {
        // A panic while holding the lock cannot leave the vector half-written.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, notification: DomainNotification) {
        tracing::debug!(key = %notification.key, "Domain notification raised");
        self.items().push(notification);
    }

    /// Returns every notification in the order it was raised.
    pub fn get_all(&self) -> Vec<DomainNotification> {
        self.items().clone()
    }

    pub fn has_any(&self) -> bool {
        !self.items().is_empty()
    }

    pub fn clear(&self) {
        self.items().clear();
    }

    /// Drains the collector.
    pub fn take(&self) -> Vec<DomainNotification> {
        std::mem::take(&mut *self.items())
    }
}
