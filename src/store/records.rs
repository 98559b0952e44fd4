//! Durable records owned by the abuse-handling side of the gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cause recorded when the escalation policy blacklists an address.
pub const ESCALATION_CAUSE: &str = "exceeded rate-limit violation threshold";

/// One rate-limit denial. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Caller IP address.
    pub ip: String,
    /// Caller user agent, if one was sent.
    pub user_agent: Option<String>,
    /// Request path.
    pub route: String,
    /// Upper-case request method.
    pub method: String,
    /// When the denial happened.
    pub created_at: DateTime<Utc>,
}

impl ViolationRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn now(
        ip: impl Into<String>,
        user_agent: Option<String>,
        route: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            ip: ip.into(),
            user_agent,
            route: route.into(),
            method: method.into().to_ascii_uppercase(),
            created_at: Utc::now(),
        }
    }
}

/// A deny-list entry. Unique per IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    /// Blocked IP address.
    pub ip: String,
    /// User agent seen when the entry was created.
    pub user_agent: Option<String>,
    /// Why the address was blocked.
    pub cause: String,
    /// When the entry was created or last replaced.
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(ip: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: None,
            cause: cause.into(),
            created_at: Utc::now(),
        }
    }

    /// Attach the offending user agent.
    #[must_use]
    pub fn with_user_agent(mut self, agent: Option<String>) -> Self {
        self.user_agent = agent;
        self
    }
}
