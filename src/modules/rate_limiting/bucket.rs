//! Token bucket implementation for rate limiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fixed-point scale: one token is stored as 1000 units.
const MILLIS_PER_TOKEN: u64 = 1000;

/// Largest burst a bucket can represent in fixed-point.
pub const MAX_BURST: u64 = u64::MAX / MILLIS_PER_TOKEN;

/// Configuration for a token bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucketConfig {
    /// Maximum tokens (burst capacity).
    pub max_tokens: u64,

    /// Time to earn back one token.
    pub refill_interval: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self {
            max_tokens: 10,
            refill_interval: Duration::from_millis(10),
        }
    }
}

impl TokenBucketConfig {
    /// Create a new token bucket configuration.
    #[must_use]
    pub fn new(max_tokens: u64, refill_interval: Duration) -> Self {
        Self {
            max_tokens,
            refill_interval,
        }
    }

    /// Tokens earned per second.
    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        1.0 / self.refill_interval.as_secs_f64().max(f64::EPSILON)
    }

    fn capacity_millis(&self) -> u64 {
        self.max_tokens.saturating_mul(MILLIS_PER_TOKEN)
    }

    fn interval_nanos(&self) -> u128 {
        self.refill_interval.as_nanos().max(1)
    }
}

/// A thread-safe token bucket.
///
/// Starts full. Each `refill_interval` earns one token back, up to
/// `max_tokens`. Every consume attempt stamps the bucket as accessed so an
/// idle sweep can age it out without touching its tokens.
#[derive(Debug)]
pub struct TokenBucket {
    config: TokenBucketConfig,

    /// Current tokens, fixed-point (actual * 1000).
    tokens_millis: AtomicU64,

    /// Last refill, nanoseconds since `created_at`.
    last_refill_nanos: AtomicU64,

    /// Last consume attempt, nanoseconds since `created_at`.
    last_access_nanos: AtomicU64,

    created_at: Instant,
}

impl TokenBucket {
    /// Create a new, full token bucket.
    #[must_use]
    pub fn new(config: TokenBucketConfig) -> Self {
        Self {
            tokens_millis: AtomicU64::new(config.capacity_millis()),
            config,
            last_refill_nanos: AtomicU64::new(0),
            last_access_nanos: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Create a bucket holding `max_tokens` that earns one token per `interval`.
    #[must_use]
    pub fn with_interval(max_tokens: u64, interval: Duration) -> Self {
        Self::new(TokenBucketConfig::new(max_tokens, interval))
    }

    /// Try to consume tokens from the bucket.
    ///
    /// Returns `true` if tokens were consumed, `false` if not enough tokens.
    pub fn try_consume(&self, tokens: u64) -> bool {
        let now = self.now_nanos();
        self.last_access_nanos.fetch_max(now, Ordering::AcqRel);
        self.refill(now);

        let needed = tokens.saturating_mul(MILLIS_PER_TOKEN);

        loop {
            let current = self.tokens_millis.load(Ordering::Acquire);

            if current < needed {
                return false;
            }

            match self.tokens_millis.compare_exchange_weak(
                current,
                current - needed,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Current token count.
    #[must_use]
    pub fn available_tokens(&self) -> f64 {
        self.projected_millis(self.now_nanos()) as f64 / MILLIS_PER_TOKEN as f64
    }

    /// Burst capacity.
    #[must_use]
    pub fn max_tokens(&self) -> u64 {
        self.config.max_tokens
    }

    /// Time to earn back one token.
    #[must_use]
    pub fn refill_interval(&self) -> Duration {
        self.config.refill_interval
    }

    /// Time until `tokens` are available.
    #[must_use]
    pub fn time_until_available(&self, tokens: u64) -> Duration {
        let current = self.projected_millis(self.now_nanos());
        let needed = tokens.saturating_mul(MILLIS_PER_TOKEN);

        if current >= needed {
            return Duration::ZERO;
        }

        let deficit = u128::from(needed - current);
        let nanos = deficit * self.config.interval_nanos() / u128::from(MILLIS_PER_TOKEN);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Time since the last consume attempt (or since creation).
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        let last = self.last_access_nanos.load(Ordering::Acquire);
        Duration::from_nanos(self.now_nanos().saturating_sub(last))
    }

    /// Whether the bucket would be full right now.
    ///
    /// Pure observation: neither consumes nor refills.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.projected_millis(self.now_nanos()) >= self.config.capacity_millis()
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.created_at.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Tokens earned between `since` and `now`, fixed-point.
    fn earned_millis(&self, since: u64, now: u64) -> u64 {
        let elapsed = u128::from(now.saturating_sub(since));
        let earned = elapsed * u128::from(MILLIS_PER_TOKEN) / self.config.interval_nanos();
        u64::try_from(earned).unwrap_or(u64::MAX)
    }

    /// Token count at `now` without writing anything back.
    fn projected_millis(&self, now: u64) -> u64 {
        let current = self.tokens_millis.load(Ordering::Acquire);
        let last = self.last_refill_nanos.load(Ordering::Acquire);
        current
            .saturating_add(self.earned_millis(last, now))
            .min(self.config.capacity_millis())
    }

    fn refill(&self, now: u64) {
        let last = self.last_refill_nanos.load(Ordering::Acquire);

        if now <= last {
            return;
        }

        let earned = self.earned_millis(last, now);
        if earned == 0 {
            return;
        }

        // One thread wins the right to credit this interval.
        if self
            .last_refill_nanos
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let max_millis = self.config.capacity_millis();
        loop {
            let current = self.tokens_millis.load(Ordering::Acquire);
            let next = current.saturating_add(earned).min(max_millis);

            if current == next {
                break;
            }

            match self.tokens_millis.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
    }
}
