//! Configuration for access control.

use serde::{Deserialize, Serialize};

/// Access control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlConfig {
    /// Header carrying the API key.
    #[serde(default = "default_api_key_name")]
    pub api_key_header: String,

    /// Query parameter carrying the API key when the header is absent.
    #[serde(default = "default_api_key_name")]
    pub api_key_query: String,

    /// Paths that never need an API key.
    #[serde(default = "default_exempt_paths")]
    pub api_key_exempt_paths: Vec<String>,

    /// Insert missing built-in rules on start.
    #[serde(default = "default_true")]
    pub seed_rules: bool,

    /// Create the super administrator group when the store has no groups.
    #[serde(default = "default_true")]
    pub bootstrap_root_group: bool,
}

fn default_api_key_name() -> String {
    "i-api-key".to_string()
}

fn default_exempt_paths() -> Vec<String> {
    vec!["/api/file/rand".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            api_key_header: default_api_key_name(),
            api_key_query: default_api_key_name(),
            api_key_exempt_paths: default_exempt_paths(),
            seed_rules: true,
            bootstrap_root_group: true,
        }
    }
}

impl AccessControlConfig {
    /// Create a new access control config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path that skips the API key check.
    #[must_use]
    pub fn with_exempt_path(mut self, path: impl Into<String>) -> Self {
        self.api_key_exempt_paths.push(path.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key_header.is_empty() && self.api_key_query.is_empty() {
            return Err("api_key_header and api_key_query cannot both be empty".to_string());
        }

        if let Some(path) = self.api_key_exempt_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(format!("exempt path must start with '/': {path}"));
        }

        Ok(())
    }
}
