//! # Gate Components
//!
//! Each pipeline stage lives in its own module. Components with background
//! work or a lifecycle implement [`crate::module::ModuleContract`].
//!
//! ## Available Modules
//!
//! - [`blacklist`] - Deny-list of caller addresses
//! - [`rate_limiting`] - Two-tier token bucket rate limiting
//! - [`escalation`] - Promotion of repeat rate-limit offenders to the blacklist
//! - [`session`] - Session token verification and identity resolution
//! - [`access_control`] - Route requirements, permission groups and API keys
//! - [`gateway`] - The pipeline tying the stages together

pub mod access_control;
pub mod blacklist;
pub mod escalation;
pub mod gateway;
pub mod rate_limiting;
pub mod session;
