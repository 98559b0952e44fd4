//! Configuration for rate limiting.

use super::bucket::MAX_BURST;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static configuration of the bucket table and its background tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Time for a bucket to earn back one token, in milliseconds.
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,

    /// How often idle buckets are swept, in milliseconds.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// How long a bucket must go untouched before it may be evicted.
    #[serde(default = "default_idle_ttl_ms")]
    pub idle_ttl_ms: u64,

    /// How often the bucket maps are compacted, in seconds.
    #[serde(default = "default_compact_interval_secs")]
    pub compact_interval_secs: u64,
}

fn default_refill_interval_ms() -> u64 {
    10
}

fn default_sweep_interval_ms() -> u64 {
    500
}

fn default_idle_ttl_ms() -> u64 {
    1000
}

fn default_compact_interval_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            refill_interval_ms: default_refill_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            idle_ttl_ms: default_idle_ttl_ms(),
            compact_interval_secs: default_compact_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Set the refill interval.
    #[must_use]
    pub fn with_refill_interval(mut self, interval: Duration) -> Self {
        self.refill_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the idle time after which buckets may be evicted.
    #[must_use]
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Refill interval as a duration.
    #[must_use]
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    /// Sweep interval as a duration.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Idle eviction threshold as a duration.
    #[must_use]
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_millis(self.idle_ttl_ms)
    }

    /// Compaction interval as a duration.
    #[must_use]
    pub fn compact_interval(&self) -> Duration {
        Duration::from_secs(self.compact_interval_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.refill_interval_ms == 0 {
            return Err("refill_interval_ms must be greater than 0".to_string());
        }

        if self.sweep_interval_ms == 0 {
            return Err("sweep_interval_ms must be greater than 0".to_string());
        }

        if self.compact_interval_secs == 0 {
            return Err("compact_interval_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Runtime rate-limit settings, read from the settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Whether limits are enforced at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Burst for each `(ip, route, method)` bucket.
    #[serde(default = "default_point_burst")]
    pub point_burst: u64,

    /// Burst for each per-ip bucket.
    #[serde(default = "default_global_burst")]
    pub global_burst: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_point_burst() -> u64 {
    10
}

fn default_global_burst() -> u64 {
    50
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            point_burst: default_point_burst(),
            global_burst: default_global_burst(),
        }
    }
}

impl RateLimitSettings {
    /// Bursts of zero fall back to the defaults; oversized bursts are
    /// clamped to [`MAX_BURST`].
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            enabled: self.enabled,
            point_burst: normalize_burst(self.point_burst, default_point_burst()),
            global_burst: normalize_burst(self.global_burst, default_global_burst()),
        }
    }
}

fn normalize_burst(burst: u64, default: u64) -> u64 {
    match burst {
        0 => default,
        burst => burst.min(MAX_BURST),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.refill_interval(), Duration::from_millis(10));
        assert_eq!(config.sweep_interval(), Duration::from_millis(500));
        assert!(config.validate().is_ok());

        let settings = RateLimitSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.point_burst, 10);
        assert_eq!(settings.global_burst, 50);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: RateLimitConfig = toml::from_str("refill_interval_ms = 25").unwrap();
        assert_eq!(config.refill_interval_ms, 25);
        assert_eq!(config.idle_ttl_ms, 1000);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = RateLimitConfig {
            refill_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_burst_normalizes_to_default() {
        let settings = RateLimitSettings {
            enabled: true,
            point_burst: 0,
            global_burst: 7,
        }
        .normalized();
        assert_eq!(settings.point_burst, 10);
        assert_eq!(settings.global_burst, 7);
    }

    #[test]
    fn test_oversized_burst_is_clamped() {
        let settings = RateLimitSettings {
            enabled: true,
            point_burst: u64::MAX / 100,
            global_burst: u64::MAX,
        }
        .normalized();
        assert_eq!(settings.point_burst, MAX_BURST);
        assert_eq!(settings.global_burst, MAX_BURST);
    }
}
