//! The gate's answer for one request.

use crate::modules::access_control::{PermissionSet, RequirementClass};
use crate::modules::session::Identity;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a request was denied, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The caller IP is on the deny-list.
    Blacklisted,
    /// A token bucket is empty.
    RateLimited,
    /// API keys are required and none, or an unknown one, was presented.
    ApiKeyRejected,
    /// The session ran out or the credential changed since it was issued.
    SessionExpired,
    /// The session token is bad, or the account is unknown or frozen.
    SessionInvalid,
    /// The route needs a signed-in caller.
    Unauthenticated,
    /// The caller lacks the route's permission.
    Forbidden,
    /// A dependency needed for the decision is unreachable.
    ConfigUnavailable,
}

impl ReasonCode {
    /// Every reason code.
    pub const ALL: [ReasonCode; 8] = [
        Self::Blacklisted,
        Self::RateLimited,
        Self::ApiKeyRejected,
        Self::SessionExpired,
        Self::SessionInvalid,
        Self::Unauthenticated,
        Self::Forbidden,
        Self::ConfigUnavailable,
    ];

    /// HTTP status the surrounding layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Blacklisted => 406,
            Self::RateLimited => 429,
            Self::ApiKeyRejected | Self::Forbidden => 403,
            Self::SessionExpired | Self::SessionInvalid | Self::Unauthenticated => 401,
            Self::ConfigUnavailable => 503,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Blacklisted => "blacklisted",
            Self::RateLimited => "rate_limited",
            Self::ApiKeyRejected => "api_key_rejected",
            Self::SessionExpired => "session_expired",
            Self::SessionInvalid => "session_invalid",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::ConfigUnavailable => "config_unavailable",
        }
    }

    /// Message safe to show the caller. Never carries internal detail.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Blacklisted => "Your IP address has been blacklisted.",
            Self::RateLimited => "Too many requests. Please slow down and retry later.",
            Self::ApiKeyRejected => "A valid API key is required.",
            Self::SessionExpired => "Your session has expired. Please sign in again.",
            Self::SessionInvalid => "Your session is not valid. Please sign in again.",
            Self::Unauthenticated => "Please sign in first.",
            Self::Forbidden => "You do not have permission to perform this action.",
            Self::ConfigUnavailable => "The service is temporarily unavailable.",
        }
    }

    /// Whether the same request may succeed if retried later.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ConfigUnavailable)
    }

    /// Whether the caller's session cookie should be cleared.
    #[must_use]
    pub fn clears_session(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::SessionInvalid)
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proceed to the handler.
    Allow,
    /// Answer with the reason's status.
    Deny,
}

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    /// No session, or no session was needed.
    #[default]
    Anonymous,
    /// A resolved identity.
    Identified(Identity),
}

impl Caller {
    /// The identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Anonymous => None,
            Self::Identified(identity) => Some(identity),
        }
    }

    /// Whether the caller is anonymous.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// The gate's answer.
///
/// On allow, handlers read `caller` and `permissions` instead of resolving
/// them again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Allow or deny.
    pub decision: Decision,
    /// Set on deny.
    pub reason: Option<ReasonCode>,
    /// The caller.
    pub caller: Caller,
    /// The caller's permission set. Empty for anonymous callers.
    pub permissions: PermissionSet,
    /// Requirement class of the route, once known.
    pub requirement: Option<RequirementClass>,
    /// Backoff hint for rate-limited callers.
    pub retry_after: Option<Duration>,
    /// Whether the session cookie must be cleared in the response.
    pub clear_cookie: bool,
}

impl Verdict {
    /// Allow `caller`.
    #[must_use]
    pub fn allow(caller: Caller, permissions: PermissionSet, requirement: RequirementClass) -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
            caller,
            permissions,
            requirement: Some(requirement),
            retry_after: None,
            clear_cookie: false,
        }
    }

    /// Deny with `reason`.
    #[must_use]
    pub fn deny(reason: ReasonCode) -> Self {
        Self {
            decision: Decision::Deny,
            reason: Some(reason),
            caller: Caller::Anonymous,
            permissions: PermissionSet::empty(),
            requirement: None,
            retry_after: None,
            clear_cookie: reason.clears_session(),
        }
    }

    /// Attach a backoff hint.
    #[must_use]
    pub fn with_retry_after(mut self, after: Duration) -> Self {
        self.retry_after = Some(after);
        self
    }

    /// Attach the route's requirement class.
    #[must_use]
    pub fn with_requirement(mut self, requirement: RequirementClass) -> Self {
        self.requirement = Some(requirement);
        self
    }

    /// Attach the resolved caller.
    #[must_use]
    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = caller;
        self
    }

    /// Whether the request may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }

    /// The resolved identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.caller.identity()
    }

    /// HTTP status for the response: 200 on allow.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.reason.map_or(200, |reason| reason.status_code())
    }
}
