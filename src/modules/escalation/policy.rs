//! Promotes repeat rate-limit offenders into the blacklist.

use super::config::EscalationSettings;
use crate::modules::blacklist::BlacklistGate;
use crate::store::{Adapters, BlacklistEntry, ViolationRecord, ESCALATION_CAUSE};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What handling one violation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// The feature flag is off.
    Disabled,
    /// The address is already blacklisted; nothing recorded.
    Skipped,
    /// Recorded, still under the threshold.
    Recorded {
        /// Violations inside the window, this one included.
        count: u64,
    },
    /// Threshold reached; the address is now blacklisted.
    Escalated {
        /// Violations inside the window, this one included.
        count: u64,
    },
    /// A store call failed; logged and dropped.
    Failed,
}

/// Counters kept by the policy.
#[derive(Debug, Default)]
pub struct EscalationStats {
    /// Violations written to the store.
    pub recorded: AtomicU64,
    /// Addresses blacklisted.
    pub escalated: AtomicU64,
    /// Store failures.
    pub failures: AtomicU64,
}

/// Records violations and blacklists addresses over the threshold.
#[derive(Debug)]
pub struct EscalationPolicy {
    adapters: Adapters,
    blacklist: Arc<BlacklistGate>,
    stats: EscalationStats,
}

impl EscalationPolicy {
    /// Create a policy that bans through `blacklist`.
    #[must_use]
    pub fn new(adapters: Adapters, blacklist: Arc<BlacklistGate>) -> Self {
        Self {
            adapters,
            blacklist,
            stats: EscalationStats::default(),
        }
    }

    /// Get statistics.
    #[must_use]
    pub fn stats(&self) -> &EscalationStats {
        &self.stats
    }

    /// Handle `violation` on a detached task.
    ///
    /// Returns `None` when there is no runtime to spawn onto.
    pub fn spawn(
        self: &Arc<Self>,
        violation: ViolationRecord,
        settings: EscalationSettings,
    ) -> Option<JoinHandle<EscalationOutcome>> {
        if !settings.enabled {
            return None;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(ip = %violation.ip, "No async runtime, violation not recorded");
            return None;
        };

        let policy = Arc::clone(self);
        Some(runtime.spawn(async move { policy.record(violation, &settings).await }))
    }

    /// Record one violation, then ban the address if the window count has
    /// reached the threshold.
    ///
    /// Never fails: store errors are logged and reported as
    /// [`EscalationOutcome::Failed`].
    pub async fn record(
        &self,
        violation: ViolationRecord,
        settings: &EscalationSettings,
    ) -> EscalationOutcome {
        if !settings.enabled {
            return EscalationOutcome::Disabled;
        }
        let settings = settings.normalized();

        if self.blacklist.contains(&violation.ip) {
            debug!(ip = %violation.ip, "Already blacklisted, violation not recorded");
            return EscalationOutcome::Skipped;
        }

        let store = self.adapters.store();
        let ip = violation.ip.clone();
        let user_agent = violation.user_agent.clone();

        if let Err(e) = self
            .adapters
            .store_call("insert_violation", store.insert_violation(violation))
            .await
        {
            self.stats.failures.fetch_add(1, Ordering::Relaxed);
            warn!(ip = %ip, stage = "escalation", error = %e, "Violation could not be recorded");
            return EscalationOutcome::Failed;
        }
        self.stats.recorded.fetch_add(1, Ordering::Relaxed);

        let window = chrono::Duration::seconds(i64::try_from(settings.window_secs).unwrap_or(i64::MAX));
        let since = Utc::now() - window;
        let count = match self
            .adapters
            .store_call("count_violations", store.count_violations(&ip, since))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!(ip = %ip, stage = "escalation", error = %e, "Violations could not be counted");
                return EscalationOutcome::Failed;
            },
        };

        if count < settings.threshold {
            debug!(ip = %ip, count, threshold = settings.threshold, "Violation recorded");
            return EscalationOutcome::Recorded { count };
        }

        let entry = BlacklistEntry::new(ip.clone(), ESCALATION_CAUSE).with_user_agent(user_agent);
        match self.blacklist.ban(entry).await {
            Ok(()) => {
                self.stats.escalated.fetch_add(1, Ordering::Relaxed);
                info!(
                    ip = %ip,
                    count,
                    window_secs = settings.window_secs,
                    "Rate-limit violations over threshold, address blacklisted"
                );
                EscalationOutcome::Escalated { count }
            },
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(ip = %ip, stage = "escalation", error = %e, "Blacklist entry could not be written");
                EscalationOutcome::Failed
            },
        }
    }
}
