//! Raw component configuration.

use super::{ModuleError, ModuleResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Configuration handed to [`super::ModuleContract::init`] and `reload`.
///
/// Holds the component's TOML section verbatim; each component parses it
/// into its own typed configuration.
#[derive(Debug, Clone, Default)]
pub struct ModuleConfig {
    raw: Option<String>,
}

impl ModuleConfig {
    /// Creates an empty configuration. Components fall back to defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a raw TOML document.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    /// Serializes a typed configuration.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::ConfigError` if the value cannot be rendered as TOML.
    pub fn from_typed<T: Serialize>(value: &T) -> ModuleResult<Self> {
        toml::to_string(value)
            .map(Self::from_raw)
            .map_err(|e| ModuleError::ConfigError(format!("failed to render config: {e}")))
    }

    /// The raw TOML, if any was provided.
    #[must_use]
    pub fn raw_config(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Parses the raw TOML, or returns `T::default()` when none was given.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::ConfigError` if the TOML does not parse into `T`.
    pub fn parse_or_default<T: DeserializeOwned + Default>(&self) -> ModuleResult<T> {
        match self.raw.as_deref() {
            Some(raw) => toml::from_str(raw)
                .map_err(|e| ModuleError::ConfigError(format!("failed to parse config: {e}"))),
            None => Ok(T::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        burst: u64,
    }

    #[test]
    fn test_parse_or_default() {
        let empty = ModuleConfig::new();
        assert_eq!(empty.parse_or_default::<Sample>().unwrap(), Sample::default());

        let raw = ModuleConfig::from_raw("burst = 7");
        assert_eq!(raw.parse_or_default::<Sample>().unwrap().burst, 7);

        let bad = ModuleConfig::from_raw("burst = \"seven\"");
        assert!(matches!(
            bad.parse_or_default::<Sample>(),
            Err(ModuleError::ConfigError(_))
        ));
    }

    #[test]
    fn test_from_typed_round_trips() {
        let config = ModuleConfig::from_typed(&Sample { burst: 3 }).unwrap();
        assert_eq!(config.parse_or_default::<Sample>().unwrap().burst, 3);
    }
}
