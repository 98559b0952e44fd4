//! # Component Contract
//!
//! Lifecycle, manifest, status and metrics shared by the gate's long-lived
//! components (the rate limiter with its background tasks, and the
//! gateway pipeline that owns everything else).

mod config;
mod contract;
mod error;
mod manifest;
mod status;

pub use config::ModuleConfig;
pub use contract::{MetricsPayload, ModuleContract};
pub use error::{ModuleError, ModuleResult};
pub use manifest::{Capability, ModuleManifest, ModuleManifestBuilder, SemVer};
pub use status::ModuleStatus;
