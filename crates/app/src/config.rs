//! Application configuration loaded from environment variables.

use std::time::Duration;

use pipeline::{Backoff, NotificationPolicy, RetryStrategy};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `RETRY_MAX_ATTEMPTS`: retries after the first execution (default: `3`)
/// - `RETRY_MIN_DELAY_MS` / `RETRY_MAX_DELAY_MS`: backoff bounds (default: `50` / `1000`)
/// - `RETRY_BACKOFF`: `fixed`, `linear` or `jittered` (default: `linear`)
/// - `NOTIFICATIONS_FAIL_RESULT`: whether notifications fail a command (default: `true`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub retry_max_attempts: u32,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub retry_backoff: Backoff,
    pub notifications_fail_result: bool,
}

impl AppConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup. Values that fail to
    /// parse fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parsed(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            retry_max_attempts: parsed(&lookup, "RETRY_MAX_ATTEMPTS").unwrap_or(defaults.retry_max_attempts),
            retry_min_delay_ms: parsed(&lookup, "RETRY_MIN_DELAY_MS").unwrap_or(defaults.retry_min_delay_ms),
            retry_max_delay_ms: parsed(&lookup, "RETRY_MAX_DELAY_MS").unwrap_or(defaults.retry_max_delay_ms),
            retry_backoff: parsed(&lookup, "RETRY_BACKOFF").unwrap_or(defaults.retry_backoff),
            notifications_fail_result: parsed(&lookup, "NOTIFICATIONS_FAIL_RESULT")
                .unwrap_or(defaults.notifications_fail_result),
        }
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        RetryStrategy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_min_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
        .with_backoff(self.retry_backoff)
    }

    pub fn notification_policy(&self) -> NotificationPolicy {
        if self.notifications_fail_result {
            NotificationPolicy::FailResult
        } else {
            NotificationPolicy::Attach
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            retry_max_attempts: 3,
            retry_min_delay_ms: 50,
            retry_max_delay_ms: 1000,
            retry_backoff: Backoff::Linear,
            notifications_fail_result: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.retry_strategy(), RetryStrategy::default());
        assert_eq!(config.notification_policy(), NotificationPolicy::FailResult);
    }

    #[test]
    fn test_empty_environment_matches_defaults() {
        assert_eq!(config_from(&[]), AppConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RETRY_MIN_DELAY_MS", "10"),
            ("RETRY_MAX_DELAY_MS", "20"),
            ("RETRY_BACKOFF", "jittered"),
            ("NOTIFICATIONS_FAIL_RESULT", "false"),
        ]);

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/orders")
        );
        let strategy = config.retry_strategy();
        assert_eq!(strategy.max_attempts(), 5);
        assert_eq!(strategy.min_delay(), Duration::from_millis(10));
        assert_eq!(strategy.max_delay(), Duration::from_millis(20));
        assert_eq!(strategy.backoff(), Backoff::Jittered);
        assert_eq!(config.notification_policy(), NotificationPolicy::Attach);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("RETRY_MAX_ATTEMPTS", "many"),
            ("LOG_FORMAT", "xml"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
    }
}
