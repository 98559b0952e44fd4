//! Group membership as a proper set of identity ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identity ids belonging to a permission group.
///
/// Stored as `|1|2|3|` (empty string for no members). Parsing ignores empty
/// and non-numeric tokens, so `||` and `|1||2|` are both read cleanly and
/// `contains(1)` never matches member `11`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MemberSet(BTreeSet<u64>);

impl MemberSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the storage form.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split('|')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .filter_map(|token| token.parse().ok())
                .collect(),
        )
    }

    /// Add `id`. Returns `false` if it was already a member.
    pub fn insert(&mut self, id: u64) -> bool {
        self.0.insert(id)
    }

    /// Remove `id`. Returns `false` if it was not a member.
    pub fn remove(&mut self, id: u64) -> bool {
        self.0.remove(&id)
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.0.contains(&id)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for MemberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str("|")?;
        for id in &self.0 {
            write!(f, "{id}|")?;
        }
        Ok(())
    }
}

impl From<String> for MemberSet {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<MemberSet> for String {
    fn from(set: MemberSet) -> Self {
        set.to_string()
    }
}

impl FromIterator<u64> for MemberSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
