//! Two-tier rate limiter: per endpoint and caller, then per caller.

use super::bucket::TokenBucket;
use super::config::{RateLimitConfig, RateLimitSettings};
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Which tier produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitScope {
    /// Limiting was switched off.
    Disabled,
    /// The `(ip, route, method)` bucket.
    Endpoint,
    /// The per-ip bucket.
    Global,
}

impl std::fmt::Display for LimitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Endpoint => write!(f, "endpoint"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Decision from a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed.
    pub allowed: bool,

    /// Whole tokens left in the deciding bucket.
    pub tokens_remaining: u64,

    /// Burst of the deciding bucket.
    pub tokens_limit: u64,

    /// Time until a token is available again.
    pub reset_after: Duration,

    /// The tier that decided.
    pub scope: LimitScope,
}

impl RateLimitDecision {
    /// Create an "allowed" decision.
    #[inline]
    #[must_use]
    pub fn allowed(tokens_remaining: u64, tokens_limit: u64, scope: LimitScope) -> Self {
        Self {
            allowed: true,
            tokens_remaining,
            tokens_limit,
            reset_after: Duration::ZERO,
            scope,
        }
    }

    /// Create a "denied" decision.
    #[inline]
    #[must_use]
    pub fn denied(tokens_limit: u64, reset_after: Duration, scope: LimitScope) -> Self {
        Self {
            allowed: false,
            tokens_remaining: 0,
            tokens_limit,
            reset_after,
            scope,
        }
    }

    /// Get retry-after in whole seconds, at least one.
    #[inline]
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        self.reset_after.as_secs().max(1)
    }
}

/// Key of an endpoint-tier bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// Caller IP.
    pub ip: String,
    /// Request path.
    pub route: String,
    /// Upper-case method.
    pub method: String,
}

impl EndpointKey {
    /// Build a key; the method is upper-cased.
    #[must_use]
    pub fn new(ip: &str, route: &str, method: &str) -> Self {
        Self {
            ip: ip.to_string(),
            route: route.to_string(),
            method: method.to_ascii_uppercase(),
        }
    }
}

/// The bucket table.
///
/// Each tier is a sharded concurrent map; creation goes through the map's
/// entry API so concurrent first hits on a key share one bucket.
pub struct RateLimiter {
    refill_interval: Duration,
    endpoints: DashMap<EndpointKey, Arc<TokenBucket>>,
    globals: DashMap<String, Arc<TokenBucket>>,
    total_checks: AtomicU64,
    total_allowed: AtomicU64,
    total_denied: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("refill_interval", &self.refill_interval)
            .field("endpoint_buckets", &self.endpoints.len())
            .field("global_buckets", &self.globals.len())
            .field("total_checks", &self.total_checks)
            .field("total_denied", &self.total_denied)
            .finish()
    }
}

impl RateLimiter {
    /// Create an empty table.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            refill_interval: config.refill_interval(),
            endpoints: DashMap::new(),
            globals: DashMap::new(),
            total_checks: AtomicU64::new(0),
            total_allowed: AtomicU64::new(0),
            total_denied: AtomicU64::new(0),
        }
    }

    /// Check both tiers for one request: endpoint first, then global.
    ///
    /// A token taken from the endpoint bucket is not returned if the
    /// global bucket then denies.
    pub fn check(
        &self,
        ip: &str,
        route: &str,
        method: &str,
        settings: &RateLimitSettings,
    ) -> RateLimitDecision {
        self.total_checks.fetch_add(1, Ordering::Relaxed);

        if !settings.enabled {
            self.total_allowed.fetch_add(1, Ordering::Relaxed);
            return RateLimitDecision::allowed(u64::MAX, u64::MAX, LimitScope::Disabled);
        }

        let settings = settings.normalized();

        let endpoint = self.check_endpoint(ip, route, method, settings.point_burst);
        if !endpoint.allowed {
            self.total_denied.fetch_add(1, Ordering::Relaxed);
            return endpoint;
        }

        let global = self.check_global(ip, settings.global_burst);
        if global.allowed {
            self.total_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_denied.fetch_add(1, Ordering::Relaxed);
        }
        global
    }

    /// Consume one token from the `(ip, route, method)` bucket.
    pub fn check_endpoint(
        &self,
        ip: &str,
        route: &str,
        method: &str,
        burst: u64,
    ) -> RateLimitDecision {
        let key = EndpointKey::new(ip, route, method);
        self.consume_in(&self.endpoints, key, burst, LimitScope::Endpoint)
    }

    /// Consume one token from the per-ip bucket.
    pub fn check_global(&self, ip: &str, burst: u64) -> RateLimitDecision {
        self.consume_in(&self.globals, ip.to_string(), burst, LimitScope::Global)
    }

    fn consume(bucket: &TokenBucket, scope: LimitScope) -> RateLimitDecision {
        if bucket.try_consume(1) {
            RateLimitDecision::allowed(bucket.available_tokens() as u64, bucket.max_tokens(), scope)
        } else {
            RateLimitDecision::denied(bucket.max_tokens(), bucket.time_until_available(1), scope)
        }
    }

    /// Consume from the bucket for `key`, creating it on first use.
    ///
    /// The shard guard is held across the consume, so a concurrent
    /// [`sweep`](Self::sweep) either sees the consumed token or runs before
    /// the bucket is looked up. A bucket whose burst no longer matches the
    /// settings is replaced.
    fn consume_in<K: Eq + Hash>(
        &self,
        map: &DashMap<K, Arc<TokenBucket>>,
        key: K,
        burst: u64,
        scope: LimitScope,
    ) -> RateLimitDecision {
        if let Some(bucket) = map.get(&key) {
            if bucket.max_tokens() == burst {
                return Self::consume(bucket.value(), scope);
            }
        }

        let interval = self.refill_interval;
        let entry = map
            .entry(key)
            .and_modify(|bucket| {
                if bucket.max_tokens() != burst {
                    *bucket = Arc::new(TokenBucket::with_interval(burst, interval));
                }
            })
            .or_insert_with(|| Arc::new(TokenBucket::with_interval(burst, interval)));
        Self::consume(entry.value(), scope)
    }

    /// Evict buckets idle for at least `idle_ttl` that are full again.
    ///
    /// Eviction is decided from timestamps and a read-only projection of
    /// the token count; nothing is consumed. `retain` write-locks each
    /// shard, so no check can be consuming from a bucket while it is
    /// evicted. Returns the number evicted.
    pub fn sweep(&self, idle_ttl: Duration) -> usize {
        let before = self.bucket_count();
        let keep = |bucket: &Arc<TokenBucket>| bucket.idle_for() < idle_ttl || !bucket.is_full();
        self.endpoints.retain(|_, bucket| keep(bucket));
        self.globals.retain(|_, bucket| keep(bucket));
        before.saturating_sub(self.bucket_count())
    }

    /// Release spare map capacity left behind by sweeps.
    pub fn compact(&self) {
        self.endpoints.shrink_to_fit();
        self.globals.shrink_to_fit();
    }

    /// Drop every bucket.
    pub fn clear(&self) {
        self.endpoints.clear();
        self.globals.clear();
    }

    /// Number of live buckets across both tiers.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.endpoints.len() + self.globals.len()
    }

    /// Number of live endpoint-tier buckets.
    #[must_use]
    pub fn endpoint_bucket_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Get total checks.
    #[must_use]
    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Relaxed)
    }

    /// Get total allowed.
    #[must_use]
    pub fn total_allowed(&self) -> u64 {
        self.total_allowed.load(Ordering::Relaxed)
    }

    /// Get total denied.
    #[must_use]
    pub fn total_denied(&self) -> u64 {
        self.total_denied.load(Ordering::Relaxed)
    }
}
