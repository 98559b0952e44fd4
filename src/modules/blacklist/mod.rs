//! # Blacklist Module
//!
//! The cheapest rejection in the pipeline: a caller whose IP is on the
//! durable deny-list is refused before any bucket or session is touched.
//!
//! Entries come from administrators ([`BlacklistGate::ban`]) or from the
//! escalation policy once an address keeps tripping the rate limiter.

mod config;
mod gate;

pub use config::BlacklistConfig;
pub use gate::{BlacklistGate, BLACKLIST_TAG};
