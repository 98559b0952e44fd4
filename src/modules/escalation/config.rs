//! Runtime settings for abuse escalation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Escalation settings, read from the settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationSettings {
    /// Feature flag. Nothing is recorded while off.
    #[serde(default)]
    pub enabled: bool,

    /// Violations within the window that trigger a ban.
    #[serde(default = "default_threshold")]
    pub threshold: u64,

    /// Sliding window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_threshold() -> u64 {
    3
}

fn default_window_secs() -> u64 {
    60
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_threshold(),
            window_secs: default_window_secs(),
        }
    }
}

impl EscalationSettings {
    /// Enabled settings with the given threshold and window.
    #[must_use]
    pub fn enabled(threshold: u64, window: Duration) -> Self {
        Self {
            enabled: true,
            threshold,
            window_secs: window.as_secs(),
        }
    }

    /// The window as a duration.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Zero threshold or window fall back to the defaults.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            enabled: self.enabled,
            threshold: if self.threshold == 0 {
                default_threshold()
            } else {
                self.threshold
            },
            window_secs: if self.window_secs == 0 {
                default_window_secs()
            } else {
                self.window_secs
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_off() {
        let settings = EscalationSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.threshold, 3);
        assert_eq!(settings.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_normalized() {
        let settings = EscalationSettings {
            enabled: true,
            threshold: 0,
            window_secs: 0,
        }
        .normalized();
        assert_eq!(settings.threshold, 3);
        assert_eq!(settings.window_secs, 60);
    }
}
