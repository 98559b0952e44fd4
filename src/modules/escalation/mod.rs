//! # Escalation Module
//!
//! Every rate-limit denial is appended to the durable violation log. When
//! an address collects `threshold` violations inside the sliding window it
//! is written to the blacklist, and from then on it is refused at the
//! blacklist gate instead of the rate limiter.
//!
//! The whole policy sits behind a feature flag in the runtime settings.

mod config;
mod policy;

pub use config::EscalationSettings;
pub use policy::{EscalationOutcome, EscalationPolicy, EscalationStats};
