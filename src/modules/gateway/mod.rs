//! # Gateway Module
//!
//! The single entry point of the gate: [`Gateway::evaluate`] turns a
//! request into a [`Verdict`]. On allow the verdict carries the resolved
//! caller and permission set, so downstream handlers never resolve them
//! again. On deny it carries a [`ReasonCode`] the surrounding layer renders
//! as an HTTP status.
//!
//! [`GatewayHandler`] wraps the pipeline in the component lifecycle: it
//! owns the rate limiter's background tasks, seeds the rule table on start
//! and refuses traffic while paused.
//!
//! ## Usage
//!
//! ```ignore
//! use admission_gate::modules::gateway::{AdmissionRequest, GatewayHandler};
//!
//! let mut gate = GatewayHandler::new(adapters);
//! gate.init(ModuleConfig::from_raw(raw_toml))?;
//! gate.start()?;
//!
//! let request = AdmissionRequest::new("10.0.0.1", "GET", "/api/article/all")
//!     .with_cookie("INIS_LOGIN_TOKEN", token);
//! let verdict = gate.evaluate(&request).await;
//! if !verdict.is_allowed() {
//!     // respond with verdict.status_code()
//! }
//! ```

mod config;
mod handler;
mod pipeline;
mod request;
mod settings;
mod stats;
mod verdict;

pub use config::GatewayConfig;
pub use handler::GatewayHandler;
pub use pipeline::Gateway;
pub use request::AdmissionRequest;
pub use settings::{GateSettings, SettingsSource, SETTINGS_CACHE_KEY, SETTINGS_TAG};
pub use stats::GatewayStats;
pub use verdict::{Caller, Decision, ReasonCode, Verdict};
