//! Shared-secret API key check layered over the other stages.

use super::config::AccessControlConfig;
use crate::store::{Adapters, StoreResult};
use tracing::{debug, warn};

/// Cache key of the accepted key list.
pub const API_KEYS_CACHE_KEY: &str = "[GET]/api/api-keys/column[value]";

/// Cache tag carried by the cached key list.
pub const API_KEYS_TAG: &str = "api-keys";

/// Result of the API key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyOutcome {
    /// The path does not need a key.
    Exempt,
    /// A known key was presented.
    Accepted,
    /// No key, or an unknown one.
    Rejected,
    /// The key list could not be loaded.
    Unavailable,
}

/// Checks presented keys against the store's key list.
#[derive(Debug, Clone)]
pub struct ApiKeyGate {
    adapters: Adapters,
    header: String,
    query: String,
    exempt_paths: Vec<String>,
}

impl ApiKeyGate {
    /// Create a gate.
    #[must_use]
    pub fn new(adapters: Adapters, config: &AccessControlConfig) -> Self {
        Self {
            adapters,
            header: config.api_key_header.to_ascii_lowercase(),
            query: config.api_key_query.clone(),
            exempt_paths: config.api_key_exempt_paths.clone(),
        }
    }

    /// Header the key is read from (lower-case).
    #[must_use]
    pub fn header_name(&self) -> &str {
        &self.header
    }

    /// Query parameter the key is read from when the header is absent.
    #[must_use]
    pub fn query_name(&self) -> &str {
        &self.query
    }

    /// Whether `path` skips the check.
    #[must_use]
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|exempt| exempt == path)
    }

    /// Check `presented` for a request to `path`.
    pub async fn check(&self, path: &str, presented: Option<&str>) -> ApiKeyOutcome {
        if self.is_exempt(path) {
            return ApiKeyOutcome::Exempt;
        }

        let Some(presented) = presented.map(str::trim).filter(|key| !key.is_empty()) else {
            debug!(route = path, stage = "api_key", "No API key presented");
            return ApiKeyOutcome::Rejected;
        };

        match self.accepted_keys().await {
            Ok(keys) if keys.iter().any(|key| key == presented) => ApiKeyOutcome::Accepted,
            Ok(_) => {
                debug!(route = path, stage = "api_key", "Unknown API key");
                ApiKeyOutcome::Rejected
            },
            Err(e) => {
                warn!(route = path, stage = "api_key", error = %e, "API key list unavailable");
                ApiKeyOutcome::Unavailable
            },
        }
    }

    async fn accepted_keys(&self) -> StoreResult<Vec<String>> {
        if let Some(keys) = self.adapters.cache_get::<Vec<String>>(API_KEYS_CACHE_KEY).await {
            return Ok(keys);
        }

        let store = self.adapters.store();
        let keys = self
            .adapters
            .store_call("api_keys", store.api_keys())
            .await?;
        self.adapters
            .cache_fill(API_KEYS_CACHE_KEY.to_string(), &keys, None, &[API_KEYS_TAG]);
        Ok(keys)
    }
}
