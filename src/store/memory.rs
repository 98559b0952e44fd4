//! In-memory cache and store backends.

use super::error::{StoreError, StoreResult};
use super::records::{BlacklistEntry, ViolationRecord};
use super::{Cache, GateStore};
use crate::modules::access_control::{PermissionGroup, PermissionRule, RuleHash};
use crate::modules::gateway::GateSettings;
use crate::modules::session::Identity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
    tags: Vec<String>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local cache with expiry and a tag index.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    tags: DashMap<String, HashSet<String>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until touched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop `key` from the index of each tag it was stored under.
    fn untag(&self, key: &str, entry: &CacheEntry) {
        for tag in &entry.tags {
            if let Some(mut keys) = self.tags.get_mut(tag) {
                keys.remove(key);
            }
            self.tags.remove_if(tag, |_, keys| keys.is_empty());
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {},
            None => return Ok(None),
        }
        // Expired: drop it so the map does not keep dead entries around.
        if let Some((key, entry)) = self.entries.remove_if(key, |_, entry| !entry.is_live(now)) {
            self.untag(&key, &entry);
        }
        Ok(None)
    }

    async fn set_tagged(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
        tags: &[&str],
    ) -> StoreResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        let entry = CacheEntry {
            value,
            expires_at,
            tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
        };
        if let Some(previous) = self.entries.insert(key.to_string(), entry) {
            self.untag(key, &previous);
        }
        for tag in tags {
            self.tags
                .entry((*tag).to_string())
                .or_default()
                .insert(key.to_string());
        }
        Ok(())
    }

    async fn has(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        if let Some((key, entry)) = self.entries.remove(key) {
            self.untag(&key, &entry);
        }
        Ok(())
    }

    async fn delete_by_tag(&self, tag: &str) -> StoreResult<()> {
        if let Some((_, keys)) = self.tags.remove(tag) {
            for key in keys {
                if let Some((key, entry)) = self.entries.remove(&key) {
                    self.untag(&key, &entry);
                }
            }
        }
        Ok(())
    }
}

/// Cache used when caching is switched off. Every read misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl Cache for NoopCache {
    async fn get(&self, _key: &str) -> StoreResult<Option<Value>> {
        Ok(None)
    }

    async fn set_tagged(
        &self,
        _key: &str,
        _value: Value,
        _ttl: Option<Duration>,
        _tags: &[&str],
    ) -> StoreResult<()> {
        Ok(())
    }

    async fn has(&self, _key: &str) -> StoreResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn delete_by_tag(&self, _tag: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// Process-local durable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: RwLock<HashMap<u64, Identity>>,
    groups: RwLock<BTreeMap<u64, PermissionGroup>>,
    rules: RwLock<HashMap<RuleHash, PermissionRule>>,
    violations: RwLock<Vec<ViolationRecord>>,
    blacklist: RwLock<HashMap<String, BlacklistEntry>>,
    settings: RwLock<Option<GateSettings>>,
    api_keys: RwLock<Vec<String>>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an identity.
    pub fn put_identity(&self, identity: Identity) {
        self.identities.write().insert(identity.id, identity);
    }

    /// Register an accepted API key.
    pub fn put_api_key(&self, key: impl Into<String>) {
        self.api_keys.write().push(key.into());
    }

    /// Every stored blacklist entry.
    #[must_use]
    pub fn blacklist_entries(&self) -> Vec<BlacklistEntry> {
        self.blacklist.read().values().cloned().collect()
    }

    /// Total violations ever recorded for `ip`.
    #[must_use]
    pub fn violation_total(&self, ip: &str) -> usize {
        self.violations.read().iter().filter(|v| v.ip == ip).count()
    }

    /// Number of stored rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.read().len()
    }

    /// Make every store call fail with `Unavailable` until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }

    /// Delay every store call by `latency`. Zero turns the delay off.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::Release);
    }

    async fn ensure_online(&self) -> StoreResult<()> {
        let latency = self.latency_ms.load(Ordering::Acquire);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GateStore for MemoryStore {
    async fn fetch_identity(&self, id: u64) -> StoreResult<Option<Identity>> {
        self.ensure_online().await?;
        Ok(self.identities.read().get(&id).cloned())
    }

    async fn groups_containing(&self, member: u64) -> StoreResult<Vec<PermissionGroup>> {
        self.ensure_online().await?;
        Ok(self
            .groups
            .read()
            .values()
            .filter(|group| !group.deleted && group.members.contains(member))
            .cloned()
            .collect())
    }

    async fn fetch_group(&self, id: u64) -> StoreResult<Option<PermissionGroup>> {
        self.ensure_online().await?;
        Ok(self.groups.read().get(&id).cloned())
    }

    async fn save_group(&self, group: PermissionGroup) -> StoreResult<()> {
        self.ensure_online().await?;
        self.groups.write().insert(group.id, group);
        Ok(())
    }

    async fn count_groups(&self) -> StoreResult<u64> {
        self.ensure_online().await?;
        Ok(self.groups.read().len() as u64)
    }

    async fn fetch_rule(&self, hash: &RuleHash) -> StoreResult<Option<PermissionRule>> {
        self.ensure_online().await?;
        Ok(self.rules.read().get(hash).cloned())
    }

    async fn insert_rule(&self, rule: PermissionRule) -> StoreResult<bool> {
        self.ensure_online().await?;
        let mut rules = self.rules.write();
        if rules.contains_key(rule.hash()) {
            return Ok(false);
        }
        rules.insert(rule.hash().clone(), rule);
        Ok(true)
    }

    async fn insert_violation(&self, record: ViolationRecord) -> StoreResult<()> {
        self.ensure_online().await?;
        self.violations.write().push(record);
        Ok(())
    }

    async fn count_violations(&self, ip: &str, since: DateTime<Utc>) -> StoreResult<u64> {
        self.ensure_online().await?;
        Ok(self
            .violations
            .read()
            .iter()
            .filter(|v| v.ip == ip && v.created_at > since)
            .count() as u64)
    }

    async fn upsert_blacklist(&self, entry: BlacklistEntry) -> StoreResult<()> {
        self.ensure_online().await?;
        self.blacklist.write().insert(entry.ip.clone(), entry);
        Ok(())
    }

    async fn remove_blacklist(&self, ip: &str) -> StoreResult<bool> {
        self.ensure_online().await?;
        Ok(self.blacklist.write().remove(ip).is_some())
    }

    async fn blacklisted_ips(&self) -> StoreResult<Vec<String>> {
        self.ensure_online().await?;
        Ok(self.blacklist.read().keys().cloned().collect())
    }

    async fn fetch_settings(&self) -> StoreResult<Option<GateSettings>> {
        self.ensure_online().await?;
        Ok(self.settings.read().clone())
    }

    async fn save_settings(&self, settings: GateSettings) -> StoreResult<()> {
        self.ensure_online().await?;
        *self.settings.write() = Some(settings);
        Ok(())
    }

    async fn api_keys(&self) -> StoreResult<Vec<String>> {
        self.ensure_online().await?;
        Ok(self.api_keys.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    #[tokio::test]
    async fn test_cache_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .set("short", json!("v"), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        cache.set("forever", json!("v"), None).await.unwrap();

        assert!(cache.has("short").await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.has("short").await.unwrap());
        assert!(cache.has("forever").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_delete_by_tag() {
        let cache = MemoryCache::new();
        cache
            .set_tagged("user[1]", json!(1), None, &["users"])
            .await
            .unwrap();
        cache
            .set_tagged("user[2]", json!(2), None, &["users"])
            .await
            .unwrap();
        cache.set("rule[GET]", json!(3), None).await.unwrap();

        cache.delete_by_tag("users").await.unwrap();

        assert!(!cache.has("user[1]").await.unwrap());
        assert!(!cache.has("user[2]").await.unwrap());
        assert!(cache.has("rule[GET]").await.unwrap());
    }

    #[tokio::test]
    async fn test_tag_index_is_pruned() {
        let cache = MemoryCache::new();
        cache
            .set_tagged("user[1]", json!(1), Some(Duration::from_millis(10)), &["user"])
            .await
            .unwrap();
        cache
            .set_tagged("user[2]", json!(2), None, &["user", "profile"])
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cache.has("user[1]").await.unwrap());
        assert_eq!(cache.tags.get("user").map(|keys| keys.len()), Some(1));

        cache.delete("user[2]").await.unwrap();
        assert!(cache.tags.is_empty());

        // Re-storing under fewer tags drops the stale ones.
        cache
            .set_tagged("user[3]", json!(3), None, &["user", "profile"])
            .await
            .unwrap();
        cache
            .set_tagged("user[3]", json!(3), None, &["user"])
            .await
            .unwrap();
        assert!(cache.tags.get("profile").is_none());

        cache.delete_by_tag("user").await.unwrap();
        assert!(cache.is_empty());
        assert!(cache.tags.is_empty());
    }

    #[tokio::test]
    async fn test_noop_cache_always_misses() {
        let cache = NoopCache;
        cache.set("k", json!(1), None).await.unwrap();
        assert!(!cache.has("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_blacklist_upsert_is_unique_per_ip() {
        let store = MemoryStore::new();
        store
            .upsert_blacklist(BlacklistEntry::new("10.0.0.1", "first"))
            .await
            .unwrap();
        store
            .upsert_blacklist(BlacklistEntry::new("10.0.0.1", "second"))
            .await
            .unwrap();

        let entries = store.blacklist_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].cause, "second");
    }

    #[tokio::test]
    async fn test_offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.blacklisted_ips().await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_offline(false);
        assert!(store.blacklisted_ips().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_violations_window() {
        let store = MemoryStore::new();
        let mut old = ViolationRecord::now("1.1.1.1", None, "/api/x", "get");
        old.created_at = Utc::now() - ChronoDuration::seconds(120);
        store.insert_violation(old).await.unwrap();
        store
            .insert_violation(ViolationRecord::now("1.1.1.1", None, "/api/x", "get"))
            .await
            .unwrap();

        let since = Utc::now() - ChronoDuration::seconds(60);
        assert_eq!(store.count_violations("1.1.1.1", since).await.unwrap(), 1);
        assert_eq!(store.count_violations("2.2.2.2", since).await.unwrap(), 0);
        assert_eq!(store.violation_total("1.1.1.1"), 2);
    }
}
