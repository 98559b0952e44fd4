//! # Cache and Store Adapter
//!
//! The gate consumes two external collaborators: a key/value cache with
//! optional time-to-live and tag-based invalidation, and a durable store
//! holding identities, permission groups and rules, violation records,
//! the blacklist and the runtime settings row.
//!
//! Both are traits so deployments can plug in their own backends. The
//! in-memory implementations in [`memory`] back the binary and the tests.
//! [`Adapters`] wraps a pair of backends with the call bounds every stage
//! must respect.

mod adapters;
mod error;
pub mod memory;
mod records;

pub use adapters::{Adapters, Timeouts};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCache, MemoryStore, NoopCache};
pub use records::{BlacklistEntry, ViolationRecord, ESCALATION_CAUSE};

use crate::modules::access_control::{PermissionGroup, PermissionRule, RuleHash};
use crate::modules::gateway::GateSettings;
use crate::modules::session::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;

/// Key/value cache with optional expiry and tag-based bulk eviction.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value. Expired entries read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Store a value. `ttl = None` means no expiry.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> StoreResult<()> {
        self.set_tagged(key, value, ttl, &[]).await
    }

    /// Store a value and attach it to every tag in `tags`.
    async fn set_tagged(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> StoreResult<()>;

    /// Whether a live entry exists for `key`.
    async fn has(&self, key: &str) -> StoreResult<bool>;

    /// Remove one entry.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remove every entry attached to `tag`.
    async fn delete_by_tag(&self, tag: &str) -> StoreResult<()>;
}

/// Durable relational store queried by the gate.
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Identity by id.
    async fn fetch_identity(&self, id: u64) -> StoreResult<Option<Identity>>;

    /// Live (not soft-deleted) groups whose member set contains `member`.
    async fn groups_containing(&self, member: u64) -> StoreResult<Vec<PermissionGroup>>;

    /// Group by id, soft-deleted groups included.
    async fn fetch_group(&self, id: u64) -> StoreResult<Option<PermissionGroup>>;

    /// Insert or replace a group.
    async fn save_group(&self, group: PermissionGroup) -> StoreResult<()>;

    /// Number of stored groups, soft-deleted included.
    async fn count_groups(&self) -> StoreResult<u64>;

    /// Rule by its `(method, route)` hash.
    async fn fetch_rule(&self, hash: &RuleHash) -> StoreResult<Option<PermissionRule>>;

    /// Insert a rule unless its hash already exists. Returns `true` if inserted.
    async fn insert_rule(&self, rule: PermissionRule) -> StoreResult<bool>;

    /// Append a violation record.
    async fn insert_violation(&self, record: ViolationRecord) -> StoreResult<()>;

    /// Violations for `ip` created strictly after `since`.
    async fn count_violations(&self, ip: &str, since: DateTime<Utc>) -> StoreResult<u64>;

    /// Insert or replace the entry for `entry.ip`.
    async fn upsert_blacklist(&self, entry: BlacklistEntry) -> StoreResult<()>;

    /// Remove the entry for `ip`. Returns `true` if one existed.
    async fn remove_blacklist(&self, ip: &str) -> StoreResult<bool>;

    /// Every blacklisted IP.
    async fn blacklisted_ips(&self) -> StoreResult<Vec<String>>;

    /// The runtime settings row, if one has been written.
    async fn fetch_settings(&self) -> StoreResult<Option<GateSettings>>;

    /// Replace the runtime settings row.
    async fn save_settings(&self, settings: GateSettings) -> StoreResult<()>;

    /// Every accepted API key.
    async fn api_keys(&self) -> StoreResult<Vec<String>>;
}
