//! Component status.

/// Where a component is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Configured, not yet started.
    Initializing,

    /// Admitting traffic.
    Running,

    /// Admitting traffic with a dependency misbehaving.
    Degraded {
        /// What is wrong.
        reason: String,
    },

    /// Not admitting traffic.
    Paused,

    /// Not configured or shut down.
    Stopped,

    /// Failed.
    Error {
        /// Failure description.
        message: String,
    },
}

impl ModuleStatus {
    /// Returns `true` only when fully running.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if running, degraded, or paused.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Running | Self::Degraded { .. } | Self::Paused)
    }

    /// Returns `true` if traffic should be evaluated.
    #[must_use]
    pub fn is_admitting(&self) -> bool {
        matches!(self, Self::Running | Self::Degraded { .. })
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Degraded { reason } => write!(f, "degraded: {reason}"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}
