//! Lifecycle errors.

use std::fmt;

/// Result type alias for lifecycle operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Errors raised by [`super::ModuleContract`] operations.
#[derive(Debug, Clone)]
pub enum ModuleError {
    /// Component failed to start.
    StartFailed(String),

    /// Component failed to stop cleanly.
    StopFailed(String),

    /// Configuration could not be parsed or failed validation.
    ConfigError(String),

    /// Operation not allowed in the current state.
    InvalidState {
        /// Current state.
        current: String,
        /// State the operation needs.
        expected: String,
    },
}

impl ModuleError {
    /// Shorthand for an invalid-state error.
    #[must_use]
    pub fn invalid_state(current: impl fmt::Display, expected: &str) -> Self {
        Self::InvalidState {
            current: current.to_string(),
            expected: expected.to_string(),
        }
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed(msg) => write!(f, "start failed: {msg}"),
            Self::StopFailed(msg) => write!(f, "stop failed: {msg}"),
            Self::ConfigError(msg) => write!(f, "configuration error: {msg}"),
            Self::InvalidState { current, expected } => {
                write!(f, "invalid state: current={current}, expected={expected}")
            },
        }
    }
}

impl std::error::Error for ModuleError {}
