//! Configuration validation system.

use super::types::GateConfig;

/// A single validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Error - configuration is invalid.
    Error,
    /// Warning - configuration may have issues.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all validation issues.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any errors.
    fn validate(&self, config: &GateConfig) -> ValidationResult;
}

/// Checks the gate section.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &GateConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.gate.name.is_empty() {
            result.add_error(ValidationError::error(
                "gate.name",
                "Gate name cannot be empty",
            ));
        }

        if config.gate.store_timeout_ms == 0 {
            result.add_error(ValidationError::error(
                "gate.store_timeout_ms",
                "Store timeout must be greater than 0",
            ));
        }

        if config.gate.cache_timeout_ms == 0 {
            result.add_error(ValidationError::error(
                "gate.cache_timeout_ms",
                "Cache timeout must be greater than 0",
            ));
        }

        result
    }
}

/// Runs each component's own checks and warns about an unchanged signing
/// secret.
#[derive(Debug, Default)]
pub struct ComponentValidator;

impl ComponentValidator {
    /// Create a new component validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for ComponentValidator {
    fn validate(&self, config: &GateConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(message) = config.gateway().validate() {
            result.add_error(ValidationError::error("components", message));
        }

        if config.session.secret == crate::modules::session::SessionConfig::default().secret {
            result.add_error(ValidationError::warning(
                "session.secret",
                "Session secret is the built-in default",
            ));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_validator_valid() {
        let config = GateConfig::default();
        let validator = BasicValidator::new();
        let result = validator.validate(&config);
        assert!(result.is_valid());
    }

    #[test]
    fn test_basic_validator_empty_name() {
        let mut config = GateConfig::default();
        config.gate.name = String::new();

        let validator = BasicValidator::new();
        let result = validator.validate(&config);

        assert!(!result.is_valid());
        assert!(result.errors()[0].message.contains("name cannot be empty"));
    }

    #[test]
    fn test_basic_validator_zero_timeout() {
        let mut config = GateConfig::default();
        config.gate.store_timeout_ms = 0;

        let result = BasicValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert_eq!(result.errors()[0].field, "gate.store_timeout_ms");
    }

    #[test]
    fn test_component_validator_default_secret_warns() {
        let config = GateConfig::default();
        let result = ComponentValidator::new().validate(&config);
        assert!(result.is_valid());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn test_component_validator_rejects_bad_section() {
        let mut config = GateConfig::default();
        config.session.secret = "s3cret".to_string();
        config.rate_limiting.refill_interval_ms = 0;

        let result = ComponentValidator::new().validate(&config);
        assert!(!result.is_valid());
        assert!(result.warnings().is_empty());
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result1 = ValidationResult::new();
        result1.add_error(ValidationError::error("field1", "error1"));

        let mut result2 = ValidationResult::new();
        result2.add_error(ValidationError::warning("field2", "warning1"));

        result1.merge(result2);
        assert_eq!(result1.errors().len(), 2);
    }
}
