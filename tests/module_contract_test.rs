//! Integration tests for the component lifecycle contract.

use admission_gate::config::{BasicValidator, ComponentValidator, ConfigLoader};
use admission_gate::module::{
    Capability, MetricsPayload, ModuleConfig, ModuleContract, ModuleError, ModuleManifest,
    ModuleResult, ModuleStatus,
};
use admission_gate::modules::gateway::{AdmissionRequest, GatewayHandler, ReasonCode};
use admission_gate::modules::rate_limiting::RateLimitHandler;
use admission_gate::store::{Adapters, Cache, GateStore, MemoryCache, MemoryStore, NoopCache, Timeouts};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// A component relying on the contract's default pause and reload.
struct TestModule {
    name: String,
    status: ModuleStatus,
    start_count: u32,
    stop_count: u32,
}

impl TestModule {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ModuleStatus::Stopped,
            start_count: 0,
            stop_count: 0,
        }
    }
}

impl ModuleContract for TestModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest::builder(&self.name)
            .description("Test module for integration tests")
            .version(1, 0, 0)
            .capability(Capability::Custom("test".to_string()))
            .build()
    }

    fn init(&mut self, _config: ModuleConfig) -> ModuleResult<()> {
        self.status = ModuleStatus::Initializing;
        Ok(())
    }

    fn start(&mut self) -> ModuleResult<()> {
        if self.status != ModuleStatus::Initializing {
            return Err(ModuleError::invalid_state(&self.status, "Initializing"));
        }
        self.status = ModuleStatus::Running;
        self.start_count += 1;
        Ok(())
    }

    fn stop(&mut self) -> ModuleResult<()> {
        self.status = ModuleStatus::Stopped;
        self.stop_count += 1;
        Ok(())
    }

    fn status(&self) -> ModuleStatus {
        self.status.clone()
    }

    fn metrics(&self) -> MetricsPayload {
        let mut metrics = MetricsPayload::new();
        metrics.counter("start_count", u64::from(self.start_count));
        metrics.counter("stop_count", u64::from(self.stop_count));
        metrics
    }
}

fn adapters(cache: Arc<dyn Cache>) -> Adapters {
    Adapters::new(
        Arc::new(MemoryStore::new()) as Arc<dyn GateStore>,
        cache,
        Timeouts::default(),
    )
}

#[test]
fn test_default_contract_behaviour() {
    let mut module = TestModule::new("test-module");
    assert!(module.start().is_err());

    module.init(ModuleConfig::new()).unwrap();
    module.start().unwrap();
    assert!(module.heartbeat());

    assert!(matches!(module.pause(), Err(ModuleError::InvalidState { .. })));
    assert!(module.resume().is_err());
    assert!(matches!(
        module.reload(ModuleConfig::new()),
        Err(ModuleError::ConfigError(_))
    ));

    let text = module.metrics().to_prometheus("test_module");
    assert!(text.contains("test_module_start_count 1"));

    module.stop().unwrap();
    assert!(!module.heartbeat());
}

#[tokio::test]
async fn test_rate_limiter_lifecycle() {
    let mut handler = RateLimitHandler::new();
    handler
        .init(ModuleConfig::from_raw("sweep_interval_ms = 50"))
        .unwrap();
    handler.start().unwrap();
    assert_eq!(handler.status(), ModuleStatus::Running);
    assert_eq!(handler.background_tasks(), 2);

    handler.stop().unwrap();
    assert_eq!(handler.status(), ModuleStatus::Stopped);
    assert_eq!(handler.background_tasks(), 0);
}

#[tokio::test]
async fn test_gate_lifecycle_from_config_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gate.toml");
    std::fs::write(
        &path,
        r#"
        [gate]
        name = "lifecycle"

        [session]
        secret = "lifecycle-secret"

        [access_control]
        seed_rules = true
        bootstrap_root_group = false

        [settings.rate_limit]
        point_burst = 2
        "#,
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_validator(BasicValidator::new())
        .with_validator(ComponentValidator::new())
        .load(&path)
        .unwrap();

    let mut gate = GatewayHandler::new(adapters(Arc::new(MemoryCache::new())));
    gate.init(ModuleConfig::from_typed(&config.gateway()).unwrap())
        .unwrap();
    assert_eq!(gate.status(), ModuleStatus::Initializing);
    gate.start().unwrap();
    assert!(gate.heartbeat());

    let request = AdmissionRequest::new("192.0.2.1", "GET", "/api/tags/all");
    let mut admitted = false;
    for _ in 0..100 {
        if gate.evaluate(&request).await.is_allowed() {
            admitted = true;
            break;
        }
        gate.rate_limiter().limiter().unwrap().clear();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(admitted);

    gate.rate_limiter().limiter().unwrap().clear();
    gate.evaluate(&request).await;
    gate.evaluate(&request).await;
    let limited = gate.evaluate(&request).await;
    assert_eq!(limited.reason, Some(ReasonCode::RateLimited));

    let metrics = gate.metrics();
    assert!(metrics.counters.get("denied_rate_limited").copied().unwrap_or(0) >= 1);
    let text = metrics.to_prometheus("admission_gate");
    assert!(text.contains("admission_gate_rate_limiter_requests_checked"));

    gate.stop().unwrap();
    assert_eq!(gate.status(), ModuleStatus::Stopped);
    assert_eq!(
        gate.evaluate(&request).await.reason,
        Some(ReasonCode::ConfigUnavailable)
    );
}

#[tokio::test]
async fn test_gate_restart_after_stop() {
    let mut gate = GatewayHandler::new(adapters(Arc::new(NoopCache)));
    gate.init(ModuleConfig::new()).unwrap();
    gate.start().unwrap();
    gate.stop().unwrap();

    gate.init(ModuleConfig::new()).unwrap();
    gate.start().unwrap();
    assert_eq!(gate.status(), ModuleStatus::Running);
    assert!(gate.start().is_err());
    gate.stop().unwrap();
}
