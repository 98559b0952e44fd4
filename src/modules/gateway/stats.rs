//! Pipeline counters.

use super::verdict::{ReasonCode, Verdict};
use crate::module::MetricsPayload;
use std::sync::atomic::{AtomicU64, Ordering};

/// Evaluations, allows, and denials per reason code.
#[derive(Debug, Default)]
pub struct GatewayStats {
    evaluations: AtomicU64,
    allowed: AtomicU64,
    denied: [AtomicU64; ReasonCode::ALL.len()],
}

impl GatewayStats {
    /// Create zeroed stats.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one verdict.
    pub fn record(&self, verdict: &Verdict) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        match verdict.reason {
            None => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
            },
            Some(reason) => {
                self.denied[slot(reason)].fetch_add(1, Ordering::Relaxed);
            },
        }
    }

    /// Verdicts produced.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Verdicts that allowed the request.
    #[must_use]
    pub fn allowed(&self) -> u64 {
        self.allowed.load(Ordering::Relaxed)
    }

    /// Denials with `reason`.
    #[must_use]
    pub fn denied(&self, reason: ReasonCode) -> u64 {
        self.denied[slot(reason)].load(Ordering::Relaxed)
    }

    /// Denials for any reason.
    #[must_use]
    pub fn denied_total(&self) -> u64 {
        self.denied.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Write the counters into `metrics`.
    pub fn export(&self, metrics: &mut MetricsPayload) {
        metrics.counter("evaluations", self.evaluations());
        metrics.counter("allowed", self.allowed());
        for reason in ReasonCode::ALL {
            metrics.counter(format!("denied_{}", reason.code()), self.denied(reason));
        }
    }
}

fn slot(reason: ReasonCode) -> usize {
    ReasonCode::ALL
        .iter()
        .position(|r| *r == reason)
        .unwrap_or_default()
}
