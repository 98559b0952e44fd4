//! Configuration for the admission pipeline.

use super::settings::GateSettings;
use crate::modules::access_control::AccessControlConfig;
use crate::modules::blacklist::BlacklistConfig;
use crate::modules::rate_limiting::RateLimitConfig;
use crate::modules::session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Every section the pipeline stages are built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Session token settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Bucket table and background task settings.
    #[serde(default)]
    pub rate_limiting: RateLimitConfig,

    /// Blacklist snapshot settings.
    #[serde(default)]
    pub blacklist: BlacklistConfig,

    /// API key and seeding settings.
    #[serde(default)]
    pub access_control: AccessControlConfig,

    /// Runtime settings used when the store has none.
    #[serde(default)]
    pub settings: GateSettings,
}

impl GatewayConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.session.validate()?;
        self.rate_limiting.validate()?;
        self.access_control.validate()?;

        if self.blacklist.refresh_interval_ms == 0 {
            return Err("blacklist refresh_interval_ms must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [session]
            secret = "s3cret"
            [rate_limiting]
            refill_interval_ms = 100
            [settings.rate_limit]
            point_burst = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.session.secret, "s3cret");
        assert_eq!(config.rate_limiting.refill_interval_ms, 100);
        assert_eq!(config.settings.rate_limit.point_burst, 2);
        assert_eq!(config.blacklist, BlacklistConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_refresh() {
        let mut config = GatewayConfig::default();
        config.blacklist.refresh_interval_ms = 0;
        assert!(config.validate().is_err());
    }
}
