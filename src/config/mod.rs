//! # Configuration
//!
//! TOML configuration for the admission gate binary: backend bounds,
//! logging, and one section per pipeline component.
//!
//! ## Example Configuration
//!
//! ```toml
//! [gate]
//! name = "admission-gate"
//! store_timeout_ms = 250
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [session]
//! secret = "replace me"
//!
//! [settings.rate_limit]
//! point_burst = 10
//! global_burst = 50
//! ```
//!
//! The `[settings]` section is only the fallback for the runtime settings
//! row kept in the store.

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{GateConfig, GateSection, LogFormat, LogLevel, LogOutput, LoggingConfig};
pub use validation::{
    BasicValidator, ComponentValidator, ValidationError, ValidationResult, ValidationSeverity,
    Validator,
};
