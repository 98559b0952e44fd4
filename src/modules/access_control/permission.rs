//! The rules a caller has been granted.

use super::group::{PermissionGroup, RuleSet};
use super::rule::RuleHash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cache tag carried by every cached permission set.
pub const GROUP_TAG: &str = "auth-group";

/// Union of the rule sets of every live group a caller belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    root: bool,
    all: bool,
    hashes: BTreeSet<RuleHash>,
}

impl PermissionSet {
    /// Nothing granted.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge the grants of `groups`. Soft-deleted groups are skipped.
    #[must_use]
    pub fn from_groups<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'a PermissionGroup>,
    {
        let mut set = Self::empty();
        for group in groups.into_iter().filter(|g| !g.deleted) {
            set.root |= group.root;
            match &group.rules {
                RuleSet::All => set.all = true,
                RuleSet::Hashes(hashes) => set.hashes.extend(hashes.iter().cloned()),
            }
        }
        set
    }

    /// Whether a caller holding this set may use the rule `hash`.
    #[must_use]
    pub fn permits(&self, hash: &RuleHash) -> bool {
        self.root || self.all || self.hashes.contains(hash)
    }

    /// Whether a root group is among the caller's groups.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.root
    }

    /// Whether a group grants every rule.
    #[must_use]
    pub fn grants_all(&self) -> bool {
        self.all
    }

    /// Explicitly granted hashes.
    #[must_use]
    pub fn hashes(&self) -> &BTreeSet<RuleHash> {
        &self.hashes
    }

    /// Cache key of the permission set of identity `id`.
    #[must_use]
    pub fn cache_key(id: u64) -> String {
        format!("user[{id}][rule-group]")
    }
}
