//! Route requirements and caller permission sets, both cache-first.

use super::group::MembershipChange;
use super::permission::{PermissionSet, GROUP_TAG};
use super::rule::{PermissionRule, RequirementClass, RuleHash, RULES_TAG};
use crate::store::{Adapters, StoreResult};
use tracing::{debug, info};

/// Outcome of checking a caller against a route's requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// The caller may proceed.
    Granted,
    /// The route needs a signed-in caller.
    Unauthenticated,
    /// The caller lacks the route's hash.
    Forbidden,
}

/// Decide whether a caller may use a route.
///
/// `common` always passes, `login` needs an identity, `default` needs an
/// identity whose permission set permits `hash`.
#[must_use]
pub fn authorize(
    class: RequirementClass,
    authenticated: bool,
    permissions: &PermissionSet,
    hash: &RuleHash,
) -> Authorization {
    match class {
        RequirementClass::Common => Authorization::Granted,
        _ if !authenticated => Authorization::Unauthenticated,
        RequirementClass::Login => Authorization::Granted,
        RequirementClass::Default if permissions.permits(hash) => Authorization::Granted,
        RequirementClass::Default => Authorization::Forbidden,
    }
}

/// Looks up route requirements and caller permission sets.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    adapters: Adapters,
}

impl RuleResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(adapters: Adapters) -> Self {
        Self { adapters }
    }

    /// Requirement class of `method` on `route`.
    ///
    /// Routes without a rule are `default`. Found rules are cached without
    /// expiry.
    ///
    /// # Errors
    ///
    /// Returns the store error or a timeout on a cache miss.
    pub async fn requirement(&self, method: &str, route: &str) -> StoreResult<RequirementClass> {
        let key = PermissionRule::cache_key(method, route);
        if let Some(rule) = self.adapters.cache_get::<PermissionRule>(&key).await {
            return Ok(rule.class);
        }

        let hash = RuleHash::of(method, route);
        let store = self.adapters.store();
        let found = self
            .adapters
            .store_call("fetch_rule", store.fetch_rule(&hash))
            .await?;

        match found {
            Some(rule) => {
                let class = rule.class;
                self.adapters.cache_fill(key, &rule, None, &[RULES_TAG]);
                Ok(class)
            },
            None => {
                debug!(method, route, "No rule for route, using default class");
                Ok(RequirementClass::Default)
            },
        }
    }

    /// Permission set of identity `id`, cached without expiry until a
    /// membership or group change evicts it.
    ///
    /// # Errors
    ///
    /// Returns the store error or a timeout on a cache miss.
    pub async fn permissions(&self, id: u64) -> StoreResult<PermissionSet> {
        let key = PermissionSet::cache_key(id);
        if let Some(set) = self.adapters.cache_get::<PermissionSet>(&key).await {
            return Ok(set);
        }

        let store = self.adapters.store();
        let groups = self
            .adapters
            .store_call("groups_containing", store.groups_containing(id))
            .await?;

        let set = PermissionSet::from_groups(&groups);
        self.adapters.cache_fill(key, &set, None, &[GROUP_TAG]);
        Ok(set)
    }

    /// Add `member` to, or remove it from, each group in `group_ids`.
    ///
    /// Soft-deleted groups are updated too; unknown ids are skipped. The
    /// member's cached permission set is evicted afterwards. Returns the
    /// number of groups whose membership actually changed.
    ///
    /// # Errors
    ///
    /// Returns the first store or cache error.
    pub async fn change_membership(
        &self,
        member: u64,
        group_ids: &[u64],
        change: MembershipChange,
    ) -> StoreResult<usize> {
        let store = self.adapters.store();
        let mut changed = 0;

        for &id in group_ids {
            let Some(mut group) = self
                .adapters
                .store_call("fetch_group", store.fetch_group(id))
                .await?
            else {
                debug!(group = id, "Skipping unknown group");
                continue;
            };

            if group.apply(member, change) {
                self.adapters
                    .store_call("save_group", store.save_group(group))
                    .await?;
                changed += 1;
            }
        }

        self.adapters
            .cache_evict(&PermissionSet::cache_key(member))
            .await?;

        info!(member, ?change, changed, "Group membership updated");
        Ok(changed)
    }

    /// Evict every cached permission set, after a group's rules or root
    /// flag changed.
    ///
    /// # Errors
    ///
    /// Returns the cache error or a timeout.
    pub async fn invalidate_group_rules(&self) -> StoreResult<()> {
        self.adapters.cache_evict_tag(GROUP_TAG).await
    }

    /// Evict every cached route requirement, after rules were edited.
    ///
    /// # Errors
    ///
    /// Returns the cache error or a timeout.
    pub async fn invalidate_rules(&self) -> StoreResult<()> {
        self.adapters.cache_evict_tag(RULES_TAG).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::access_control::{PermissionGroup, RuleSet};
    use crate::store::{Cache, GateStore, MemoryCache, MemoryStore, Timeouts};
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver() -> (RuleResolver, Arc<MemoryStore>, Arc<MemoryCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let adapters = Adapters::new(
            Arc::clone(&store) as Arc<dyn GateStore>,
            Arc::clone(&cache) as Arc<dyn Cache>,
            Timeouts::default(),
        );
        (RuleResolver::new(adapters), store, cache)
    }

    async fn wait_for_key(cache: &MemoryCache, key: &str) -> bool {
        for _ in 0..50 {
            if cache.has(key).await.unwrap() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[test]
    fn test_authorize_matrix() {
        let none = PermissionSet::empty();
        let hash = RuleHash::of("GET", "/api/x");

        assert_eq!(
            authorize(RequirementClass::Common, false, &none, &hash),
            Authorization::Granted
        );
        assert_eq!(
            authorize(RequirementClass::Login, false, &none, &hash),
            Authorization::Unauthenticated
        );
        assert_eq!(
            authorize(RequirementClass::Login, true, &none, &hash),
            Authorization::Granted
        );
        assert_eq!(
            authorize(RequirementClass::Default, false, &none, &hash),
            Authorization::Unauthenticated
        );
        assert_eq!(
            authorize(RequirementClass::Default, true, &none, &hash),
            Authorization::Forbidden
        );

        let group = PermissionGroup::new(1, "g").with_rules(RuleSet::of([hash.clone()]));
        let granted = PermissionSet::from_groups([&group]);
        assert_eq!(
            authorize(RequirementClass::Default, true, &granted, &hash),
            Authorization::Granted
        );
    }

    #[tokio::test]
    async fn test_requirement_lookup_and_cache() {
        let (resolver, store, cache) = resolver();
        store
            .insert_rule(PermissionRule::new("GET", "/api/tags/all", RequirementClass::Common))
            .await
            .unwrap();

        assert_eq!(
            resolver.requirement("get", "/api/tags/all").await.unwrap(),
            RequirementClass::Common
        );
        assert!(wait_for_key(&cache, "rule[GET][/api/tags/all]").await);

        // Unknown routes are the strictest class, including look-alikes of
        // a cached route.
        assert_eq!(
            resolver.requirement("GET", "/api/nope").await.unwrap(),
            RequirementClass::Default
        );
        assert_eq!(
            resolver.requirement("GET", "/api/tags.all").await.unwrap(),
            RequirementClass::Default
        );

        // Cached requirement survives a store outage.
        store.set_offline(true);
        assert_eq!(
            resolver.requirement("GET", "/api/tags/all").await.unwrap(),
            RequirementClass::Common
        );
        assert!(resolver.requirement("GET", "/api/nope").await.is_err());
    }

    #[tokio::test]
    async fn test_permissions_cached_until_membership_changes() {
        let (resolver, store, cache) = resolver();
        let hash = RuleHash::of("DELETE", "/api/users/delete");
        store
            .save_group(PermissionGroup::new(2, "moderators").with_rules(RuleSet::of([hash.clone()])))
            .await
            .unwrap();

        assert!(!resolver.permissions(7).await.unwrap().permits(&hash));
        assert!(wait_for_key(&cache, "user[7][rule-group]").await);

        let changed = resolver
            .change_membership(7, &[2, 99], MembershipChange::Add)
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert!(resolver.permissions(7).await.unwrap().permits(&hash));

        // Adding again changes nothing.
        let changed = resolver
            .change_membership(7, &[2], MembershipChange::Add)
            .await
            .unwrap();
        assert_eq!(changed, 0);
        let group = store.fetch_group(2).await.unwrap().unwrap();
        assert_eq!(group.members.to_string(), "|7|");
    }

    #[tokio::test]
    async fn test_change_membership_updates_deleted_groups() {
        let (resolver, store, _) = resolver();
        let mut group = PermissionGroup::new(4, "archived").with_members([1, 7]);
        group.deleted = true;
        store.save_group(group).await.unwrap();

        resolver
            .change_membership(7, &[4], MembershipChange::Remove)
            .await
            .unwrap();
        let group = store.fetch_group(4).await.unwrap().unwrap();
        assert_eq!(group.members.to_string(), "|1|");
    }

    #[tokio::test]
    async fn test_invalidate_tags() {
        let (resolver, _, cache) = resolver();
        cache
            .set_tagged("user[1][rule-group]", serde_json::json!({}), None, &[GROUP_TAG])
            .await
            .unwrap();
        cache
            .set_tagged("rule[GET][/api/x]", serde_json::json!({}), None, &[RULES_TAG])
            .await
            .unwrap();

        resolver.invalidate_group_rules().await.unwrap();
        assert!(!cache.has("user[1][rule-group]").await.unwrap());
        assert!(cache.has("rule[GET][/api/x]").await.unwrap());

        resolver.invalidate_rules().await.unwrap();
        assert!(!cache.has("rule[GET][/api/x]").await.unwrap());
    }
}
