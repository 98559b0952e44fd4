//! Rate limiting handler implementing ModuleContract.

use super::config::{RateLimitConfig, RateLimitSettings};
use super::limiter::{LimitScope, RateLimitDecision, RateLimiter};
use crate::module::{
    Capability, MetricsPayload, ModuleConfig, ModuleContract, ModuleError, ModuleManifest,
    ModuleResult, ModuleStatus,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Statistics for the rate limiting handler.
#[derive(Debug, Default)]
pub struct RateLimitStats {
    /// Idle sweeps run.
    pub sweep_cycles: AtomicU64,
    /// Buckets evicted by sweeps.
    pub buckets_evicted: AtomicU64,
    /// Compactions run.
    pub compactions: AtomicU64,
    /// Live buckets after the last sweep.
    pub active_buckets: AtomicU64,
}

impl RateLimitStats {
    /// Create new stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sweep.
    pub fn record_sweep(&self, evicted: usize, remaining: usize) {
        self.sweep_cycles.fetch_add(1, Ordering::Relaxed);
        self.buckets_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
        self.active_buckets
            .store(remaining as u64, Ordering::Relaxed);
    }

    /// Record a compaction.
    pub fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }
}

/// Owns the bucket table and its sweep and compaction tasks.
pub struct RateLimitHandler {
    config: RateLimitConfig,
    limiter: Option<Arc<RateLimiter>>,
    status: ModuleStatus,
    stats: Arc<RateLimitStats>,
    started_at: Option<Instant>,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for RateLimitHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitHandler")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .field("status", &self.status)
            .field("stats", &self.stats)
            .field("background_tasks", &self.tasks.len())
            .finish()
    }
}

impl RateLimitHandler {
    /// Create a new rate limit handler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    /// Create a rate limit handler with custom configuration.
    #[must_use]
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            limiter: None,
            status: ModuleStatus::Stopped,
            stats: Arc::new(RateLimitStats::new()),
            started_at: None,
            tasks: Vec::new(),
        }
    }

    /// Check one request against both tiers.
    ///
    /// Allows everything until the handler is initialized.
    pub fn check(
        &self,
        ip: &str,
        route: &str,
        method: &str,
        settings: &RateLimitSettings,
    ) -> RateLimitDecision {
        match self.limiter {
            Some(ref limiter) => limiter.check(ip, route, method, settings),
            None => RateLimitDecision::allowed(u64::MAX, u64::MAX, LimitScope::Disabled),
        }
    }

    /// Get the rate limiter.
    #[must_use]
    pub fn limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<RateLimitStats> {
        &self.stats
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Run one idle sweep now.
    pub fn sweep(&self) -> usize {
        match self.limiter {
            Some(ref limiter) => sweep_once(limiter, &self.stats, self.config.idle_ttl()),
            None => 0,
        }
    }

    /// Get uptime.
    #[must_use]
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Number of background tasks currently attached.
    #[must_use]
    pub fn background_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn spawn_background(&mut self) {
        let Some(limiter) = self.limiter.clone() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; idle sweep and compaction will not run");
            return;
        };

        let sweep_limiter = Arc::clone(&limiter);
        let sweep_stats = Arc::clone(&self.stats);
        let sweep_every = self.config.sweep_interval();
        let idle_ttl = self.config.idle_ttl();
        self.tasks.push(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(sweep_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = sweep_once(&sweep_limiter, &sweep_stats, idle_ttl);
                if evicted > 0 {
                    debug!(evicted, "Swept idle rate-limit buckets");
                }
            }
        }));

        let compact_stats = Arc::clone(&self.stats);
        let compact_every = self.config.compact_interval();
        self.tasks.push(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(compact_every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.compact();
                compact_stats.record_compaction();
            }
        }));
    }

    fn abort_background(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

fn sweep_once(limiter: &RateLimiter, stats: &RateLimitStats, idle_ttl: Duration) -> usize {
    let evicted = limiter.sweep(idle_ttl);
    stats.record_sweep(evicted, limiter.bucket_count());
    evicted
}

impl Default for RateLimitHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RateLimitHandler {
    fn drop(&mut self) {
        self.abort_background();
    }
}

impl ModuleContract for RateLimitHandler {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest::builder("rate-limiter")
            .description("Two-tier token bucket rate limiting")
            .version(1, 0, 0)
            .capability(Capability::RateLimiting)
            .capability(Capability::HotReload)
            .build()
    }

    fn init(&mut self, config: ModuleConfig) -> ModuleResult<()> {
        if self.status != ModuleStatus::Stopped {
            return Err(ModuleError::invalid_state(&self.status, "Stopped"));
        }

        debug!("Initializing rate limiter");

        let rate_config: RateLimitConfig = config.parse_or_default()?;
        rate_config.validate().map_err(ModuleError::ConfigError)?;

        self.limiter = Some(Arc::new(RateLimiter::new(&rate_config)));
        self.config = rate_config;
        self.status = ModuleStatus::Initializing;

        info!(
            refill_interval_ms = self.config.refill_interval_ms,
            "Rate limiter initialized"
        );
        Ok(())
    }

    fn start(&mut self) -> ModuleResult<()> {
        if self.status != ModuleStatus::Initializing {
            return Err(ModuleError::invalid_state(&self.status, "Initializing"));
        }

        debug!("Starting rate limiter");

        self.spawn_background();
        self.started_at = Some(Instant::now());
        self.status = ModuleStatus::Running;

        info!(
            sweep_interval_ms = self.config.sweep_interval_ms,
            idle_ttl_ms = self.config.idle_ttl_ms,
            tasks = self.tasks.len(),
            "Rate limiter started"
        );

        Ok(())
    }

    fn stop(&mut self) -> ModuleResult<()> {
        debug!("Stopping rate limiter");

        self.abort_background();

        if let Some(ref limiter) = self.limiter {
            info!(
                total_checks = limiter.total_checks(),
                allowed = limiter.total_allowed(),
                denied = limiter.total_denied(),
                "Rate limiter stopping"
            );
        }

        self.status = ModuleStatus::Stopped;
        self.started_at = None;

        info!("Rate limiter stopped");
        Ok(())
    }

    fn reload(&mut self, config: ModuleConfig) -> ModuleResult<()> {
        debug!("Reloading rate limiter configuration");

        if config.raw_config().is_none() {
            return Err(ModuleError::ConfigError(
                "no configuration provided".to_string(),
            ));
        }

        let new_config: RateLimitConfig = config.parse_or_default()?;
        new_config.validate().map_err(ModuleError::ConfigError)?;

        // Existing buckets keep their interval; a new one needs a fresh table.
        if new_config.refill_interval_ms != self.config.refill_interval_ms
            || self.limiter.is_none()
        {
            self.limiter = Some(Arc::new(RateLimiter::new(&new_config)));
        }
        self.config = new_config;

        if self.status == ModuleStatus::Running {
            self.abort_background();
            self.spawn_background();
        }

        info!("Rate limiter configuration reloaded");
        Ok(())
    }

    fn status(&self) -> ModuleStatus {
        self.status.clone()
    }

    fn metrics(&self) -> MetricsPayload {
        let mut metrics = MetricsPayload::new();

        if let Some(ref limiter) = self.limiter {
            metrics.counter("requests_checked", limiter.total_checks());
            metrics.counter("requests_allowed", limiter.total_allowed());
            metrics.counter("requests_denied", limiter.total_denied());
            metrics.gauge("active_buckets", limiter.bucket_count() as f64);
        }

        metrics.counter(
            "sweep_cycles",
            self.stats.sweep_cycles.load(Ordering::Relaxed),
        );
        metrics.counter(
            "buckets_evicted",
            self.stats.buckets_evicted.load(Ordering::Relaxed),
        );
        metrics.counter(
            "compactions",
            self.stats.compactions.load(Ordering::Relaxed),
        );

        if let Some(uptime) = self.uptime() {
            metrics.gauge("uptime_seconds", uptime.as_secs_f64());
        }

        metrics
    }

    fn heartbeat(&self) -> bool {
        self.status == ModuleStatus::Running
    }
}
