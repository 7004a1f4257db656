//! Tailer configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default wait before polling an exhausted cursor again.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(500);

/// Default wait after a failed fetch or cursor open.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Tailer configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailerConfig {
    /// Wait before polling again when no record is available.
    /// Default: 500ms
    pub idle_delay: Duration,

    /// Wait before retrying after a source failure.
    /// Default: 2s
    pub retry_delay: Duration,

    /// Name of the worker thread used by `Tailer::spawn`.
    pub thread_name: String,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            idle_delay: DEFAULT_IDLE_DELAY,
            retry_delay: DEFAULT_RETRY_DELAY,
            thread_name: "oplog-tailer".to_string(),
        }
    }
}

impl TailerConfig {
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TailerConfig::default();
        assert_eq!(config.idle_delay, Duration::from_millis(500));
        assert_eq!(config.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: TailerConfig =
            serde_json::from_str(r#"{"thread_name": "users-feed"}"#).unwrap();
        assert_eq!(config.thread_name, "users-feed");
        assert_eq!(config.idle_delay, DEFAULT_IDLE_DELAY);
        assert_eq!(config.retry_delay, DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_builders() {
        let config = TailerConfig::default()
            .with_idle_delay(Duration::from_millis(10))
            .with_retry_delay(Duration::from_millis(20));
        assert_eq!(config.idle_delay, Duration::from_millis(10));
        assert_eq!(config.retry_delay, Duration::from_millis(20));
    }
}
