//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default quiet window before a debounced save is sent.
pub const DEFAULT_QUIET_WINDOW_MS: u64 = 800;

/// Default capacity of the save notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Tunables for a review session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Per-question debounce window in milliseconds
    pub quiet_window_ms: u64,
    /// Buffered save notifications per subscriber; slow subscribers lag
    pub notification_capacity: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: DEFAULT_QUIET_WINDOW_MS,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl ReviewConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::default();
        assert_eq!(config.quiet_window(), Duration::from_millis(800));
        assert_eq!(config.notification_capacity, 64);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ReviewConfig::from_json(r#"{"quiet_window_ms": 250}"#).unwrap();
        assert_eq!(config.quiet_window_ms, 250);
        assert_eq!(config.notification_capacity, DEFAULT_NOTIFICATION_CAPACITY);

        assert_eq!(ReviewConfig::from_json("{}").unwrap(), ReviewConfig::default());
        assert!(ReviewConfig::from_json("[]").is_err());
    }
}
