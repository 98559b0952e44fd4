//! Permission groups.

use super::member_set::MemberSet;
use super::rule::RuleHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Rules a group grants: everything, or an explicit list of hashes.
///
/// Stored as the sentinel `all` or as comma-separated hashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleSet {
    /// Every rule.
    All,
    /// Listed rules only.
    Hashes(BTreeSet<RuleHash>),
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::Hashes(BTreeSet::new())
    }
}

impl RuleSet {
    /// Parse the storage form. Only the exact sentinel `all` grants everything.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "all" {
            return Self::All;
        }
        Self::Hashes(
            raw.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(RuleHash::from_stored)
                .collect(),
        )
    }

    /// A list of hashes.
    #[must_use]
    pub fn of<I: IntoIterator<Item = RuleHash>>(hashes: I) -> Self {
        Self::Hashes(hashes.into_iter().collect())
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Hashes(hashes) => {
                let joined: Vec<&str> = hashes.iter().map(RuleHash::as_str).collect();
                f.write_str(&joined.join(","))
            },
        }
    }
}

impl From<String> for RuleSet {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<RuleSet> for String {
    fn from(set: RuleSet) -> Self {
        set.to_string()
    }
}

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// Add the identity.
    Add,
    /// Remove the identity.
    Remove,
}

/// A named set of identities sharing a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGroup {
    /// Group id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Member identity ids.
    #[serde(default)]
    pub members: MemberSet,
    /// Members skip every hash check.
    #[serde(default)]
    pub root: bool,
    /// Granted rules.
    #[serde(default)]
    pub rules: RuleSet,
    /// Soft-deleted. Deleted groups grant nothing but keep their members.
    #[serde(default)]
    pub deleted: bool,
}

impl PermissionGroup {
    /// An empty, non-root group.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            members: MemberSet::new(),
            root: false,
            rules: RuleSet::default(),
            deleted: false,
        }
    }

    /// Set the members.
    #[must_use]
    pub fn with_members<I: IntoIterator<Item = u64>>(mut self, members: I) -> Self {
        self.members = members.into_iter().collect();
        self
    }

    /// Set the granted rules.
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Grant root.
    #[must_use]
    pub fn as_root(mut self) -> Self {
        self.root = true;
        self
    }

    /// Apply a membership change. Returns `true` if the set changed.
    pub fn apply(&mut self, member: u64, change: MembershipChange) -> bool {
        match change {
            MembershipChange::Add => self.members.insert(member),
            MembershipChange::Remove => self.members.remove(member),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_set_sentinel_is_exact() {
        assert_eq!(RuleSet::parse(" all "), RuleSet::All);
        assert_ne!(RuleSet::parse("all,123"), RuleSet::All);
        assert_ne!(RuleSet::parse("ALL"), RuleSet::All);
    }

    #[test]
    fn test_rule_set_hash_list() {
        let set = RuleSet::parse("12, 34,,56");
        let RuleSet::Hashes(hashes) = &set else {
            panic!("expected hashes");
        };
        assert_eq!(hashes.len(), 3);
        assert!(hashes.contains(&RuleHash::from_stored("34")));
        assert_eq!(set.to_string(), "12,34,56");
        assert_eq!(RuleSet::parse("").to_string(), "");
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut group = PermissionGroup::new(2, "editors").with_members([1]);
        assert!(!group.apply(1, MembershipChange::Add));
        assert!(group.apply(3, MembershipChange::Add));
        assert_eq!(group.members.to_string(), "|1|3|");

        assert!(group.apply(1, MembershipChange::Remove));
        assert!(!group.apply(1, MembershipChange::Remove));
        assert_eq!(group.members.to_string(), "|3|");
    }

    #[test]
    fn test_group_serde_uses_storage_forms() {
        let group = PermissionGroup::new(1, "admins")
            .with_members([1])
            .with_rules(RuleSet::All)
            .as_root();
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["members"], "|1|");
        assert_eq!(json["rules"], "all");
    }
}
