//! # Rate Limiting Module
//!
//! Two tiers of token buckets guard every request:
//!
//! - **Endpoint tier**: one bucket per `(ip, route, method)`
//! - **Global tier**: one bucket per ip, shared by all its endpoints
//!
//! Each bucket starts full at its burst and earns one token back per
//! refill interval. A background sweep evicts buckets that have been idle
//! long enough to refill, and a slower task compacts the bucket maps.
//!
//! ## Usage
//!
//! ```ignore
//! use admission_gate::modules::rate_limiting::{RateLimitHandler, RateLimitSettings};
//!
//! let mut handler = RateLimitHandler::new();
//! handler.init(ModuleConfig::new())?;
//! handler.start()?;
//!
//! let decision = handler.check("10.0.0.1", "/api/users", "GET", &RateLimitSettings::default());
//! if !decision.allowed {
//!     // 429, retry after decision.retry_after_secs()
//! }
//! ```

mod bucket;
mod config;
mod handler;
mod limiter;

pub use bucket::{TokenBucket, TokenBucketConfig, MAX_BURST};
pub use config::{RateLimitConfig, RateLimitSettings};
pub use handler::{RateLimitHandler, RateLimitStats};
pub use limiter::{EndpointKey, LimitScope, RateLimitDecision, RateLimiter};
