//! Permission rules: one `(method, route)` pair and how strictly it is guarded.

use crate::digest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache tag carried by every cached route requirement.
pub const RULES_TAG: &str = "auth-rules";

/// Stable fingerprint of a `(method, route)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleHash(String);

impl RuleHash {
    /// Fingerprint `method` (case-insensitive) and `route`.
    #[must_use]
    pub fn of(method: &str, route: &str) -> Self {
        Self(digest::sum32(&format!(
            "[{}]{}",
            method.to_ascii_uppercase(),
            route
        )))
    }

    /// Wrap a hash read from storage.
    #[must_use]
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The hash text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How strictly a route is guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementClass {
    /// Anyone, signed in or not.
    Common,
    /// Any signed-in caller.
    Login,
    /// Only callers granted the route's hash. Also applies to unknown routes.
    #[default]
    Default,
}

impl fmt::Display for RequirementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => write!(f, "common"),
            Self::Login => write!(f, "login"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A guarded `(method, route)` pair.
///
/// The hash is computed once at construction and travels with the row from
/// then on; it is never recomputed for an existing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Upper-case method.
    pub method: String,
    /// Request path.
    pub route: String,
    /// Requirement class.
    #[serde(rename = "type", default)]
    pub class: RequirementClass,
    hash: RuleHash,
}

impl PermissionRule {
    /// A rule for `method` and `route`.
    #[must_use]
    pub fn new(method: &str, route: impl Into<String>, class: RequirementClass) -> Self {
        let route = route.into();
        let method = method.to_ascii_uppercase();
        Self {
            hash: RuleHash::of(&method, &route),
            name: String::new(),
            method,
            route,
            class,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The rule's hash.
    #[must_use]
    pub fn hash(&self) -> &RuleHash {
        &self.hash
    }

    /// Cache key of the requirement for `method` and `route`. The route is
    /// kept verbatim so distinct paths never share a key.
    #[must_use]
    pub fn cache_key(method: &str, route: &str) -> String {
        format!("rule[{}][{}]", method.to_ascii_uppercase(), route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_method_case_insensitive() {
        assert_eq!(
            RuleHash::of("delete", "/api/users/delete"),
            RuleHash::of("DELETE", "/api/users/delete")
        );
        assert_ne!(
            RuleHash::of("GET", "/api/users/delete"),
            RuleHash::of("DELETE", "/api/users/delete")
        );
        assert_eq!(
            RuleHash::of("GET", "/api/test").as_str(),
            digest::sum32("[GET]/api/test")
        );
    }

    #[test]
    fn test_rule_keeps_stored_hash() {
        let rule = PermissionRule::new("get", "/api/tags/all", RequirementClass::Common);
        assert_eq!(rule.method, "GET");

        let mut json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "common");

        // A row whose route was edited later keeps the hash it was created with.
        json["route"] = serde_json::json!("/api/tags/every");
        let stored: PermissionRule = serde_json::from_value(json).unwrap();
        assert_eq!(stored.hash(), rule.hash());
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(
            PermissionRule::cache_key("get", "/api/users/one"),
            "rule[GET][/api/users/one]"
        );
        assert_ne!(
            PermissionRule::cache_key("GET", "/api/users/one"),
            PermissionRule::cache_key("GET", "/api/users.one")
        );
    }

    #[test]
    fn test_missing_class_is_default() {
        let rule: PermissionRule = serde_json::from_value(serde_json::json!({
            "method": "PUT",
            "route": "/api/x",
            "hash": "1"
        }))
        .unwrap();
        assert_eq!(rule.class, RequirementClass::Default);
    }
}
