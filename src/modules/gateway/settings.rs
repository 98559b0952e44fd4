//! Runtime settings: the configuration surface the gate consumes.

use crate::modules::escalation::EscalationSettings;
use crate::modules::rate_limiting::RateLimitSettings;
use crate::store::{Adapters, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cache key of the settings row.
pub const SETTINGS_CACHE_KEY: &str = "config[SYSTEM_GATE]";

/// Cache tag carried by the cached settings row.
pub const SETTINGS_TAG: &str = "config";

/// Settings read on every request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSettings {
    /// Whether an API key is required.
    #[serde(default)]
    pub api_key_required: bool,

    /// Rate limiting flag and bursts.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Escalation flag, threshold and window.
    #[serde(default)]
    pub escalation: EscalationSettings,
}

/// Reads the settings row cache-first and falls back to the configured
/// defaults when the store has no row or cannot be reached.
#[derive(Debug, Clone)]
pub struct SettingsSource {
    adapters: Adapters,
    fallback: GateSettings,
}

impl SettingsSource {
    /// Create a source falling back to `fallback`.
    #[must_use]
    pub fn new(adapters: Adapters, fallback: GateSettings) -> Self {
        Self { adapters, fallback }
    }

    /// The configured fallback.
    #[must_use]
    pub fn fallback(&self) -> GateSettings {
        self.fallback
    }

    /// Current settings. Never fails.
    pub async fn current(&self) -> GateSettings {
        if let Some(settings) = self.adapters.cache_get::<GateSettings>(SETTINGS_CACHE_KEY).await {
            return settings;
        }

        let store = self.adapters.store();
        match self
            .adapters
            .store_call("fetch_settings", store.fetch_settings())
            .await
        {
            Ok(Some(settings)) => {
                self.adapters.cache_fill(
                    SETTINGS_CACHE_KEY.to_string(),
                    &settings,
                    None,
                    &[SETTINGS_TAG],
                );
                settings
            },
            Ok(None) => {
                debug!("No settings row, using configured settings");
                self.fallback
            },
            Err(e) => {
                warn!(error = %e, "Settings unavailable, using configured settings");
                self.fallback
            },
        }
    }

    /// Replace the settings row and drop the cached copy.
    ///
    /// # Errors
    ///
    /// Returns the store or cache error.
    pub async fn update(&self, settings: GateSettings) -> StoreResult<()> {
        let store = self.adapters.store();
        self.adapters
            .store_call("save_settings", store.save_settings(settings))
            .await?;
        self.adapters.cache_evict(SETTINGS_CACHE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Cache, GateStore, MemoryCache, MemoryStore, Timeouts};
    use std::sync::Arc;
    use std::time::Duration;

    fn source(fallback: GateSettings) -> (SettingsSource, Arc<MemoryStore>, Arc<MemoryCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let adapters = Adapters::new(
            Arc::clone(&store) as Arc<dyn GateStore>,
            Arc::clone(&cache) as Arc<dyn Cache>,
            Timeouts::default(),
        );
        (SettingsSource::new(adapters, fallback), store, cache)
    }

    #[tokio::test]
    async fn test_fallback_without_row() {
        let fallback = GateSettings {
            api_key_required: true,
            ..Default::default()
        };
        let (source, store, _) = source(fallback);
        assert_eq!(source.current().await, fallback);

        store.set_offline(true);
        assert_eq!(source.current().await, fallback);
    }

    #[tokio::test]
    async fn test_update_is_visible_immediately() {
        let (source, _, cache) = source(GateSettings::default());
        let mut settings = GateSettings::default();
        settings.rate_limit.point_burst = 3;
        source.update(settings).await.unwrap();
        assert_eq!(source.current().await.rate_limit.point_burst, 3);

        for _ in 0..50 {
            if cache.has(SETTINGS_CACHE_KEY).await.unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        settings.rate_limit.point_burst = 4;
        source.update(settings).await.unwrap();
        assert_eq!(source.current().await.rate_limit.point_burst, 4);
    }

    #[test]
    fn test_parse_settings_toml() {
        let settings: GateSettings = toml::from_str(
            r#"
            api_key_required = true
            [rate_limit]
            point_burst = 5
            [escalation]
            enabled = true
            "#,
        )
        .unwrap();
        assert!(settings.api_key_required);
        assert_eq!(settings.rate_limit.point_burst, 5);
        assert_eq!(settings.rate_limit.global_burst, 50);
        assert!(settings.escalation.enabled);
        assert_eq!(settings.escalation.threshold, 3);
    }
}
