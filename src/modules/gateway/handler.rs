//! Gateway handler implementing ModuleContract.

use super::config::GatewayConfig;
use super::pipeline::Gateway;
use super::request::AdmissionRequest;
use super::stats::GatewayStats;
use super::verdict::{ReasonCode, Verdict};
use crate::module::{
    Capability, MetricsPayload, ModuleConfig, ModuleContract, ModuleError, ModuleManifest,
    ModuleResult, ModuleStatus,
};
use crate::modules::rate_limiting::RateLimitHandler;
use crate::store::Adapters;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns the pipeline and the rate limiter beneath it.
pub struct GatewayHandler {
    adapters: Adapters,
    config: GatewayConfig,
    rate_limiter: RateLimitHandler,
    gateway: Option<Arc<Gateway>>,
    status: ModuleStatus,
    stats: Arc<GatewayStats>,
    started_at: Option<Instant>,
    seeding: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for GatewayHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayHandler")
            .field("config", &self.config)
            .field("rate_limiter", &self.rate_limiter)
            .field("status", &self.status)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl GatewayHandler {
    /// Create a handler over `adapters`.
    #[must_use]
    pub fn new(adapters: Adapters) -> Self {
        Self {
            adapters,
            config: GatewayConfig::default(),
            rate_limiter: RateLimitHandler::new(),
            gateway: None,
            status: ModuleStatus::Stopped,
            stats: Arc::new(GatewayStats::new()),
            started_at: None,
            seeding: None,
        }
    }

    /// Decide whether `request` may proceed.
    ///
    /// Denies with [`ReasonCode::ConfigUnavailable`] while the handler is
    /// not admitting traffic.
    pub async fn evaluate(&self, request: &AdmissionRequest) -> Verdict {
        match self.gateway {
            Some(ref gateway) if self.status.is_admitting() => gateway.evaluate(request).await,
            _ => {
                debug!(
                    ip = %request.client_ip,
                    route = %request.path,
                    method = %request.method,
                    status = %self.status,
                    "Gate not admitting"
                );
                let verdict = Verdict::deny(ReasonCode::ConfigUnavailable);
                self.stats.record(&verdict);
                verdict
            },
        }
    }

    /// The pipeline, once initialized.
    #[must_use]
    pub fn gateway(&self) -> Option<&Arc<Gateway>> {
        self.gateway.as_ref()
    }

    /// The rate limiter handler.
    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimitHandler {
        &self.rate_limiter
    }

    /// Pipeline counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn build_gateway(&mut self) -> ModuleResult<()> {
        let Some(limiter) = self.rate_limiter.limiter().cloned() else {
            return Err(ModuleError::invalid_state(
                self.rate_limiter.status(),
                "Initializing",
            ));
        };

        self.gateway = Some(Arc::new(Gateway::with_stats(
            self.adapters.clone(),
            limiter,
            &self.config,
            Arc::clone(&self.stats),
        )));
        Ok(())
    }

    fn spawn_seeding(&mut self) {
        let seed_rules = self.config.access_control.seed_rules;
        let bootstrap = self.config.access_control.bootstrap_root_group;
        if !seed_rules && !bootstrap {
            return;
        }

        let Some(gateway) = self.gateway.clone() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; rule table not seeded");
            return;
        };

        self.seeding = Some(runtime.spawn(async move {
            match gateway.seed(seed_rules, bootstrap).await {
                Ok((inserted, created)) => {
                    debug!(inserted, root_group_created = created, "Seeding finished");
                },
                Err(e) => error!(error = %e, "Seeding failed"),
            }
        }));
    }

    fn abort_seeding(&mut self) {
        if let Some(task) = self.seeding.take() {
            task.abort();
        }
    }
}

impl Drop for GatewayHandler {
    fn drop(&mut self) {
        self.abort_seeding();
    }
}

impl ModuleContract for GatewayHandler {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest::builder("admission-gate")
            .description("Blacklist, rate limit, session and permission checks")
            .version(1, 0, 0)
            .capability(Capability::IpFiltering)
            .capability(Capability::RateLimiting)
            .capability(Capability::AbuseEscalation)
            .capability(Capability::Authentication)
            .capability(Capability::Authorization)
            .capability(Capability::Metrics)
            .capability(Capability::HotReload)
            .build()
    }

    fn init(&mut self, config: ModuleConfig) -> ModuleResult<()> {
        if self.status != ModuleStatus::Stopped {
            return Err(ModuleError::invalid_state(&self.status, "Stopped"));
        }

        debug!("Initializing admission gate");

        let gate_config: GatewayConfig = config.parse_or_default()?;
        gate_config.validate().map_err(ModuleError::ConfigError)?;

        self.rate_limiter = RateLimitHandler::new();
        self.rate_limiter
            .init(ModuleConfig::from_typed(&gate_config.rate_limiting)?)?;
        self.config = gate_config;
        self.build_gateway()?;
        self.status = ModuleStatus::Initializing;

        info!(
            token_name = %self.config.session.token_name,
            api_key_required = self.config.settings.api_key_required,
            "Admission gate initialized"
        );
        Ok(())
    }

    fn start(&mut self) -> ModuleResult<()> {
        if self.status != ModuleStatus::Initializing {
            return Err(ModuleError::invalid_state(&self.status, "Initializing"));
        }

        debug!("Starting admission gate");

        self.rate_limiter.start()?;
        self.spawn_seeding();
        self.started_at = Some(Instant::now());
        self.status = ModuleStatus::Running;

        info!("Admission gate started");
        Ok(())
    }

    fn stop(&mut self) -> ModuleResult<()> {
        debug!("Stopping admission gate");

        self.abort_seeding();
        if self.rate_limiter.status() != ModuleStatus::Stopped {
            self.rate_limiter.stop()?;
        }

        info!(
            evaluations = self.stats.evaluations(),
            allowed = self.stats.allowed(),
            denied = self.stats.denied_total(),
            "Admission gate stopping"
        );

        self.gateway = None;
        self.status = ModuleStatus::Stopped;
        self.started_at = None;

        info!("Admission gate stopped");
        Ok(())
    }

    fn reload(&mut self, config: ModuleConfig) -> ModuleResult<()> {
        debug!("Reloading admission gate configuration");

        if config.raw_config().is_none() {
            return Err(ModuleError::ConfigError(
                "no configuration provided".to_string(),
            ));
        }

        let new_config: GatewayConfig = config.parse_or_default()?;
        new_config.validate().map_err(ModuleError::ConfigError)?;

        if self.rate_limiter.status() == ModuleStatus::Stopped {
            self.rate_limiter
                .init(ModuleConfig::from_typed(&new_config.rate_limiting)?)?;
        } else {
            self.rate_limiter
                .reload(ModuleConfig::from_typed(&new_config.rate_limiting)?)?;
        }
        self.config = new_config;
        self.build_gateway()?;

        info!("Admission gate configuration reloaded");
        Ok(())
    }

    fn status(&self) -> ModuleStatus {
        self.status.clone()
    }

    fn metrics(&self) -> MetricsPayload {
        let mut metrics = MetricsPayload::new();
        self.stats.export(&mut metrics);

        if let Some(ref gateway) = self.gateway {
            let escalation = gateway.escalation().stats();
            metrics.counter(
                "violations_recorded",
                escalation.recorded.load(Ordering::Relaxed),
            );
            metrics.counter(
                "addresses_escalated",
                escalation.escalated.load(Ordering::Relaxed),
            );
            metrics.counter(
                "escalation_failures",
                escalation.failures.load(Ordering::Relaxed),
            );
            metrics.gauge("blacklist_entries", gateway.blacklist().len() as f64);
            metrics.counter(
                "blacklist_refresh_failures",
                gateway.blacklist().refresh_failures(),
            );
        }

        if let Some(started) = self.started_at {
            metrics.gauge("uptime_seconds", started.elapsed().as_secs_f64());
        }

        metrics.absorb("rate_limiter", self.rate_limiter.metrics());
        metrics
    }

    fn heartbeat(&self) -> bool {
        self.status.is_operational() && self.rate_limiter.heartbeat()
    }

    fn pause(&mut self) -> ModuleResult<()> {
        if self.status != ModuleStatus::Running {
            return Err(ModuleError::invalid_state(&self.status, "Running"));
        }
        self.status = ModuleStatus::Paused;
        info!("Admission gate paused");
        Ok(())
    }

    fn resume(&mut self) -> ModuleResult<()> {
        if self.status != ModuleStatus::Paused {
            return Err(ModuleError::invalid_state(&self.status, "Paused"));
        }
        self.status = ModuleStatus::Running;
        info!("Admission gate resumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Cache, GateStore, MemoryCache, MemoryStore, Timeouts};
    use std::time::Duration;

    fn handler() -> (GatewayHandler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let adapters = Adapters::new(
            Arc::clone(&store) as Arc<dyn GateStore>,
            Arc::new(MemoryCache::new()) as Arc<dyn Cache>,
            Timeouts::default(),
        );
        (GatewayHandler::new(adapters), store)
    }

    #[test]
    fn test_manifest() {
        let (handler, _) = handler();
        let manifest = handler.manifest();
        assert_eq!(manifest.name, "admission-gate");
        assert!(manifest.has_capability(&Capability::Authorization));
        assert!(manifest.has_capability(&Capability::RateLimiting));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (mut handler, _) = handler();
        let result = handler.init(ModuleConfig::from_raw("[session]\nsecret = \"\""));
        assert!(matches!(result, Err(ModuleError::ConfigError(_))));
        assert_eq!(handler.status(), ModuleStatus::Stopped);
    }

    #[tokio::test]
    async fn test_uninitialized_denies() {
        let (handler, _) = handler();
        let verdict = handler
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;
        assert_eq!(verdict.reason, Some(ReasonCode::ConfigUnavailable));
        assert_eq!(handler.stats().denied(ReasonCode::ConfigUnavailable), 1);
    }

    #[tokio::test]
    async fn test_start_seeds_rules() {
        let (mut handler, store) = handler();
        handler.init(ModuleConfig::new()).unwrap();
        handler.start().unwrap();

        for _ in 0..100 {
            if store.rule_count() > 0 && store.count_groups().await.unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(store.rule_count() > 0);
        assert_eq!(store.count_groups().await.unwrap(), 1);

        let verdict = handler
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;
        assert!(verdict.is_allowed());

        handler.stop().unwrap();
    }

    #[tokio::test]
    async fn test_pause_denies_and_resume_admits() {
        let (mut handler, _) = handler();
        handler
            .init(ModuleConfig::from_raw(
                "[access_control]\nseed_rules = false\nbootstrap_root_group = false",
            ))
            .unwrap();
        handler.start().unwrap();

        handler.pause().unwrap();
        assert_eq!(handler.status(), ModuleStatus::Paused);
        let verdict = handler
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;
        assert_eq!(verdict.reason, Some(ReasonCode::ConfigUnavailable));

        handler.resume().unwrap();
        let verdict = handler
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;
        assert_ne!(verdict.reason, Some(ReasonCode::ConfigUnavailable));

        assert!(handler.resume().is_err());
        handler.stop().unwrap();
    }

    #[tokio::test]
    async fn test_metrics_include_rate_limiter() {
        let (mut handler, _) = handler();
        handler.init(ModuleConfig::new()).unwrap();
        handler.start().unwrap();
        handler
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;

        let metrics = handler.metrics();
        assert_eq!(metrics.counters.get("evaluations"), Some(&1));
        assert_eq!(
            metrics.counters.get("rate_limiter_requests_checked"),
            Some(&1)
        );
        assert!(metrics.gauges.contains_key("blacklist_entries"));

        handler.stop().unwrap();
    }

    #[tokio::test]
    async fn test_reload_keeps_stats() {
        let (mut handler, _) = handler();
        handler.init(ModuleConfig::new()).unwrap();
        handler
            .evaluate(&AdmissionRequest::new("10.0.0.1", "GET", "/api/tags/all"))
            .await;

        handler
            .reload(ModuleConfig::from_raw("[settings]\napi_key_required = true"))
            .unwrap();
        assert!(handler.config().settings.api_key_required);
        assert_eq!(handler.stats().evaluations(), 1);
    }
}
