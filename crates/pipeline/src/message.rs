//! Messages and their caller-facing outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::notification::{DomainNotification, NotificationPolicy};

/// A command or query routed through a [`Pipeline`](crate::Pipeline).
pub trait Message: fmt::Debug + Send + Sync + 'static {
    /// What the terminal handler returns for expected outcomes.
    type Output: Outcome;

    /// Stable name used in logs, metrics and errors.
    fn message_type() -> &'static str;
}

/// A validation failure or notification reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub key: String,
    pub message: String,
}

impl Failure {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

impl From<DomainNotification> for Failure {
    fn from(notification: DomainNotification) -> Self {
        Self {
            key: notification.key,
            message: notification.message,
        }
    }
}

/// The expected-outcome channel of a message.
///
/// Validation failures and business notifications are folded into the
/// output; only unexpected or infrastructure failures become errors.
pub trait Outcome: fmt::Debug + Send + Sync + 'static {
    /// Builds a failed outcome carrying `failures`.
    fn from_failures(failures: Vec<Failure>) -> Self;

    fn is_failure(&self) -> bool;

    /// Folds leftover notifications into the outcome according to `policy`.
    fn with_notifications(
        self,
        notifications: Vec<DomainNotification>,
        policy: NotificationPolicy,
    ) -> Self;
}

/// Result of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: Option<String>,
    pub failures: Vec<Failure>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            failures: Vec::new(),
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// A failed result with a single message and no itemised failures.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            failures: Vec::new(),
        }
    }
}

impl Outcome for CommandResult {
    fn from_failures(failures: Vec<Failure>) -> Self {
        Self {
            success: false,
            message: Some("Validation failed".to_string()),
            failures,
        }
    }

    fn is_failure(&self) -> bool {
        !self.success
    }

    fn with_notifications(
        mut self,
        notifications: Vec<DomainNotification>,
        policy: NotificationPolicy,
    ) -> Self {
        if notifications.is_empty() {
            return self;
        }
        self.failures
            .extend(notifications.into_iter().map(Failure::from));
        if policy == NotificationPolicy::FailResult {
            self.success = false;
            self.message
                .get_or_insert_with(|| "Domain notifications raised".to_string());
        }
        self
    }
}

/// Result of a query. `value` is `None` both for "not found" and for a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub value: Option<T>,
    pub failures: Vec<Failure>,
}

impl<T> QueryResult<T> {
    pub fn found(value: T) -> Self {
        Self {
            value: Some(value),
            failures: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            value: None,
            failures: Vec::new(),
        }
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

impl<T> Outcome for QueryResult<T>
where
    T: fmt::Debug + Send + Sync + 'static,
{
    fn from_failures(failures: Vec<Failure>) -> Self {
        Self {
            value: None,
            failures,
        }
    }

    fn is_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    fn with_notifications(
        mut self,
        notifications: Vec<DomainNotification>,
        policy: NotificationPolicy,
    ) -> Self {
        if notifications.is_empty() {
            return self;
        }
        self.failures
            .extend(notifications.into_iter().map(Failure::from));
        if policy == NotificationPolicy::FailResult {
            self.value = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Vec<DomainNotification> {
        vec![DomainNotification::new("sku-7", "quantity merged")]
    }

    #[test]
    fn fail_result_policy_turns_success_into_failure() {
        let result = CommandResult::ok()
            .with_notifications(notification(), NotificationPolicy::FailResult);

        assert!(result.is_failure());
        assert_eq!(result.failures, vec![Failure::new("sku-7", "quantity merged")]);
        assert_eq!(result.message.as_deref(), Some("Domain notifications raised"));
    }

    #[test]
    fn attach_policy_keeps_status() {
        let result = CommandResult::ok_with_message("done")
            .with_notifications(notification(), NotificationPolicy::Attach);

        assert!(!result.is_failure());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.message.as_deref(), Some("done"));
    }

    #[test]
    fn no_notifications_is_identity() {
        let result = CommandResult::ok().with_notifications(Vec::new(), NotificationPolicy::FailResult);
        assert_eq!(result, CommandResult::ok());
    }

    #[test]
    fn query_failure_drops_value() {
        let result = QueryResult::found(42_u64)
            .with_notifications(notification(), NotificationPolicy::FailResult);
        assert!(result.is_failure());
        assert_eq!(result.value, None);

        let result = QueryResult::<u64>::from_failures(vec![Failure::new("id", "required")]);
        assert!(result.is_failure());
    }

    #[test]
    fn command_result_serializes() {
        let json = serde_json::to_value(CommandResult::failure("nope")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "nope");
    }
}
