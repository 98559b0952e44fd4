//! Configuration type definitions.

use crate::modules::access_control::AccessControlConfig;
use crate::modules::blacklist::BlacklistConfig;
use crate::modules::gateway::{GateSettings, GatewayConfig};
use crate::modules::rate_limiting::RateLimitConfig;
use crate::modules::session::SessionConfig;
use crate::store::Timeouts;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure for the admission gate.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Instance identity and backend bounds.
    pub gate: GateSection,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Session token settings.
    pub session: SessionConfig,

    /// Bucket table and background task settings.
    pub rate_limiting: RateLimitConfig,

    /// Blacklist snapshot settings.
    pub blacklist: BlacklistConfig,

    /// API key and seeding settings.
    pub access_control: AccessControlConfig,

    /// Fallback runtime settings.
    pub settings: GateSettings,
}

impl GateConfig {
    /// The sections the pipeline is built from.
    #[must_use]
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            session: self.session.clone(),
            rate_limiting: self.rate_limiting.clone(),
            blacklist: self.blacklist.clone(),
            access_control: self.access_control.clone(),
            settings: self.settings,
        }
    }

    /// Bounds for backend calls.
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            store: Duration::from_millis(self.gate.store_timeout_ms),
            cache: Duration::from_millis(self.gate.cache_timeout_ms),
        }
    }
}

/// Gate section configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSection {
    /// Instance name.
    pub name: String,

    /// Whether the cache backend is used. When off every lookup goes to
    /// the store.
    pub cache_enabled: bool,

    /// Bound for store calls, in milliseconds.
    pub store_timeout_ms: u64,

    /// Bound for cache calls, in milliseconds.
    pub cache_timeout_ms: u64,
}

impl Default for GateSection {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        Self {
            name: "admission-gate".to_string(),
            cache_enabled: true,
            store_timeout_ms: timeouts.store.as_millis() as u64,
            cache_timeout_ms: timeouts.cache.as_millis() as u64,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: LogLevel,

    /// Log format (json, pretty, compact).
    pub format: LogFormat,

    /// Output destination.
    pub output: LogOutput,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable).
    Json,
    /// Pretty format with colors (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output (default).
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gate_config() {
        let config = GateConfig::default();
        assert_eq!(config.gate.name, "admission-gate");
        assert!(config.gate.cache_enabled);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.timeouts(), Timeouts::default());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml_str = r#"
            [gate]
            name = "test-gate"
        "#;

        let config: GateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gate.name, "test-gate");
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [gate]
            name = "full-gate"
            cache_enabled = false
            store_timeout_ms = 500
            cache_timeout_ms = 20

            [logging]
            level = "debug"
            format = "json"
            output = "stderr"

            [session]
            token_name = "SID"
            secret = "s3cret"
            expire_secs = 3600

            [rate_limiting]
            refill_interval_ms = 100

            [blacklist]
            refresh_interval_ms = 1000

            [access_control]
            api_key_exempt_paths = ["/health"]

            [settings]
            api_key_required = true

            [settings.rate_limit]
            point_burst = 5

            [settings.escalation]
            enabled = true
            threshold = 4
        "#;

        let config: GateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.gate.name, "full-gate");
        assert!(!config.gate.cache_enabled);
        assert_eq!(config.timeouts().store, Duration::from_millis(500));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.output, LogOutput::Stderr);
        assert_eq!(config.session.token_name, "SID");
        assert_eq!(config.rate_limiting.refill_interval_ms, 100);
        assert_eq!(config.blacklist.refresh_interval_ms, 1000);
        assert_eq!(config.access_control.api_key_exempt_paths, vec!["/health"]);
        assert!(config.settings.api_key_required);
        assert_eq!(config.settings.rate_limit.point_burst, 5);
        assert_eq!(config.settings.escalation.threshold, 4);

        let gateway = config.gateway();
        assert_eq!(gateway.session.secret, "s3cret");
        assert_eq!(gateway.settings, config.settings);
    }
}
