//! Configuration for session resolution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session token configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Cookie carrying the session token.
    #[serde(default = "default_token_name")]
    pub token_name: String,

    /// HS256 signing secret.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// `iss` claim written and required.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// `sub` claim written on issue.
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Lifetime of issued tokens, in seconds.
    #[serde(default = "default_expire_secs")]
    pub expire_secs: u64,

    /// Clock skew tolerated on `exp`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
}

fn default_token_name() -> String {
    "INIS_LOGIN_TOKEN".to_string()
}

fn default_secret() -> String {
    "change-me".to_string()
}

fn default_issuer() -> String {
    "admission-gate".to_string()
}

fn default_subject() -> String {
    "session".to_string()
}

fn default_expire_secs() -> u64 {
    7 * 24 * 60 * 60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_name: default_token_name(),
            secret: default_secret(),
            issuer: default_issuer(),
            subject: default_subject(),
            expire_secs: default_expire_secs(),
            leeway_secs: 0,
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("token_name", &self.token_name)
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("subject", &self.subject)
            .field("expire_secs", &self.expire_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

impl SessionConfig {
    /// Token lifetime as a duration.
    #[must_use]
    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("session secret must not be empty".to_string());
        }

        if self.token_name.is_empty() {
            return Err("session token_name must not be empty".to_string());
        }

        if self.expire_secs == 0 {
            return Err("session expire_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let config = SessionConfig {
            secret: "hunter2".to_string(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("INIS_LOGIN_TOKEN"));
    }

    #[test]
    fn test_validate() {
        assert!(SessionConfig::default().validate().is_ok());

        let empty = SessionConfig {
            secret: String::new(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());
    }
}
