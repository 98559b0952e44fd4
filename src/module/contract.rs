//! The lifecycle contract shared by gate components.

use super::{ModuleConfig, ModuleError, ModuleManifest, ModuleResult, ModuleStatus};
use std::collections::BTreeMap;

/// Metrics reported by a component.
///
/// Keys are sorted so the Prometheus rendering is stable between scrapes.
#[derive(Debug, Clone, Default)]
pub struct MetricsPayload {
    /// Monotonic counters.
    pub counters: BTreeMap<String, u64>,

    /// Point-in-time values.
    pub gauges: BTreeMap<String, f64>,
}

impl MetricsPayload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a counter.
    pub fn counter(&mut self, name: impl Into<String>, value: u64) {
        self.counters.insert(name.into(), value);
    }

    /// Sets a gauge.
    pub fn gauge(&mut self, name: impl Into<String>, value: f64) {
        self.gauges.insert(name.into(), value);
    }

    /// Merges `other` into this payload, prefixing its names.
    pub fn absorb(&mut self, prefix: &str, other: MetricsPayload) {
        for (name, value) in other.counters {
            self.counters.insert(format!("{prefix}_{name}"), value);
        }
        for (name, value) in other.gauges {
            self.gauges.insert(format!("{prefix}_{name}"), value);
        }
    }

    /// Renders the payload in Prometheus text exposition format.
    #[must_use]
    pub fn to_prometheus(&self, prefix: &str) -> String {
        let mut output = String::new();

        for (name, value) in &self.counters {
            output.push_str(&format!("# TYPE {prefix}_{name} counter\n"));
            output.push_str(&format!("{prefix}_{name} {value}\n"));
        }

        for (name, value) in &self.gauges {
            output.push_str(&format!("# TYPE {prefix}_{name} gauge\n"));
            output.push_str(&format!("{prefix}_{name} {value}\n"));
        }

        output
    }
}

/// Lifecycle every long-lived gate component implements.
///
/// # Lifecycle
///
/// 1. `manifest()` - identity and capabilities
/// 2. `init()` - parse and validate configuration
/// 3. `start()` - begin serving; background tasks are spawned here
/// 4. `pause()` / `resume()` - stop or restart admitting traffic
/// 5. `status()` / `metrics()` - monitoring
/// 6. `reload()` - apply new configuration in place
/// 7. `stop()` - release background tasks
///
/// `start()` spawns onto the ambient Tokio runtime when one is present, so
/// components that own background work must be started from inside it.
pub trait ModuleContract: Send + Sync {
    /// Returns the component's manifest.
    fn manifest(&self) -> ModuleManifest;

    /// Initializes the component from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::ConfigError` if the configuration is invalid,
    /// or `ModuleError::InvalidState` if the component is not stopped.
    fn init(&mut self, config: ModuleConfig) -> ModuleResult<()>;

    /// Starts the component.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::InvalidState` if called before `init()`.
    fn start(&mut self) -> ModuleResult<()>;

    /// Stops the component and its background tasks.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::StopFailed` if shutdown fails.
    fn stop(&mut self) -> ModuleResult<()>;

    /// Applies new configuration without a restart.
    ///
    /// # Errors
    ///
    /// The default implementation always fails: reload is opt-in.
    fn reload(&mut self, _config: ModuleConfig) -> ModuleResult<()> {
        Err(ModuleError::ConfigError(
            "hot reload not supported".to_string(),
        ))
    }

    /// Current status.
    fn status(&self) -> ModuleStatus;

    /// Current metrics.
    fn metrics(&self) -> MetricsPayload;

    /// Liveness probe. Defaults to "operational".
    fn heartbeat(&self) -> bool {
        self.status().is_operational()
    }

    /// Stops admitting new work.
    ///
    /// # Errors
    ///
    /// The default implementation always fails: pausing is opt-in.
    fn pause(&mut self) -> ModuleResult<()> {
        Err(ModuleError::InvalidState {
            current: self.status().to_string(),
            expected: "pausable module".to_string(),
        })
    }

    /// Resumes after `pause()`.
    ///
    /// # Errors
    ///
    /// The default implementation always fails: pausing is opt-in.
    fn resume(&mut self) -> ModuleResult<()> {
        Err(ModuleError::InvalidState {
            current: self.status().to_string(),
            expected: "paused".to_string(),
        })
    }
}
