//! # Admission Gate
//!
//! Per-request admission control for an HTTP API. Every request passes a
//! fixed pipeline before it reaches a handler:
//!
//! - IP blacklist
//! - Two-tier token-bucket rate limiting, with repeat offenders escalated
//!   into the blacklist
//! - Optional shared-secret API key
//! - Signed session tokens bound to the caller's current credential
//! - Coarse group-based route permissions
//!
//! The outcome is a [`modules::gateway::Verdict`]: allow, with the resolved
//! caller and permission set attached, or deny with a reason code.
//!
//! ## Architecture
//!
//! Long-lived components implement the [`module::ModuleContract`] trait for
//! uniform lifecycle management. Durable state and caching are reached
//! through the traits in [`store`], so any backend can be plugged in.

pub mod config;
pub mod digest;
pub mod module;
pub mod modules;
pub mod store;
pub mod telemetry;
