//! The caller record a session resolves to.

use crate::digest;
use serde::{Deserialize, Serialize};

/// Cache tag carried by every cached identity.
pub const IDENTITY_TAG: &str = "users";

/// Account state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// May sign in.
    #[default]
    Active,
    /// Blocked by an administrator.
    Frozen,
}

/// A caller record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Numeric id.
    pub id: u64,

    /// Login name.
    #[serde(default)]
    pub account: String,

    /// Stored password hash. Only its digest ever leaves the store.
    pub credential_hash: String,

    /// Account state.
    #[serde(default)]
    pub status: AccountStatus,
}

impl Identity {
    /// An active identity.
    #[must_use]
    pub fn new(id: u64, account: impl Into<String>, credential_hash: impl Into<String>) -> Self {
        Self {
            id,
            account: account.into(),
            credential_hash: credential_hash.into(),
            status: AccountStatus::Active,
        }
    }

    /// Set the account state.
    #[must_use]
    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    /// Digest embedded in session tokens; changes whenever the credential does.
    #[must_use]
    pub fn credential_digest(&self) -> String {
        digest::sum32(&self.credential_hash)
    }

    /// Whether the account is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.status == AccountStatus::Frozen
    }

    /// Cache key of the identity with `id`.
    #[must_use]
    pub fn cache_key(id: u64) -> String {
        format!("user[{id}]")
    }
}
