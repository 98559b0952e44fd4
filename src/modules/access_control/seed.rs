//! The built-in route table and first-run bootstrap.

use super::group::{PermissionGroup, RuleSet};
use super::rule::{PermissionRule, RequirementClass};
use crate::store::{Adapters, StoreResult};
use std::collections::BTreeMap;
use tracing::{debug, info};

use RequirementClass::{Common, Default as Gated, Login};

/// One route of the built-in table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedRoute {
    /// Upper-case method.
    pub method: &'static str,
    /// Request path.
    pub route: String,
    /// Requirement class.
    pub class: RequirementClass,
    /// Display name.
    pub name: String,
}

impl SeedRoute {
    /// The rule row for this route.
    #[must_use]
    pub fn to_rule(&self) -> PermissionRule {
        PermissionRule::new(self.method, self.route.clone(), self.class).with_name(self.name.clone())
    }
}

const READS: [&str; 8] = ["one", "all", "sum", "min", "max", "rand", "count", "column"];
const WRITES: [(&str, &[&str]); 3] = [
    ("PUT", &["update", "restore"]),
    ("POST", &["save", "create"]),
    ("DELETE", &["remove", "delete", "clear"]),
];

type Extra = (&'static str, &'static str, RequirementClass);

/// A resource under `/api/<name>/`.
struct Resource {
    name: &'static str,
    label: &'static str,
    /// Class of the standard read actions, if the resource has them.
    reads: Option<RequirementClass>,
    /// Restricts the standard reads to these actions.
    read_subset: Option<&'static [&'static str]>,
    /// Class of the standard write actions, if the resource has them.
    writes: Option<RequirementClass>,
    /// Additional or overriding `(method, action, class)` entries.
    extra: &'static [Extra],
}

impl Resource {
    const fn crud(name: &'static str, label: &'static str, reads: RequirementClass) -> Self {
        Self {
            name,
            label,
            reads: Some(reads),
            read_subset: None,
            writes: Some(Gated),
            extra: &[],
        }
    }

    const fn custom(name: &'static str, label: &'static str, extra: &'static [Extra]) -> Self {
        Self {
            name,
            label,
            reads: None,
            read_subset: None,
            writes: None,
            extra,
        }
    }

    const fn with_writes(mut self, class: RequirementClass) -> Self {
        self.writes = Some(class);
        self
    }

    const fn with_reads_only(mut self, actions: &'static [&'static str]) -> Self {
        self.read_subset = Some(actions);
        self
    }

    const fn with_extra(mut self, extra: &'static [Extra]) -> Self {
        self.extra = extra;
        self
    }
}

const RESOURCES: &[Resource] = &[
    Resource::custom(
        "test",
        "Test",
        &[
            ("GET", "", Common),
            ("GET", "request", Common),
            ("PUT", "request", Common),
            ("POST", "request", Common),
            ("DELETE", "request", Common),
        ],
    ),
    Resource::custom(
        "proxy",
        "Proxy",
        &[
            ("GET", "", Login),
            ("PUT", "", Login),
            ("POST", "", Login),
            ("PATCH", "", Login),
            ("DELETE", "", Login),
        ],
    ),
    Resource::custom(
        "file",
        "File",
        &[
            ("GET", "rand", Common),
            ("GET", "to-base64", Common),
            ("POST", "upload", Login),
        ],
    ),
    Resource::custom(
        "comm",
        "Common",
        &[
            ("POST", "login", Common),
            ("POST", "social-login", Common),
            ("POST", "register", Common),
            ("POST", "check-token", Common),
            ("POST", "reset-password", Common),
            ("DELETE", "logout", Common),
        ],
    ),
    Resource::custom(
        "toml",
        "Service config",
        &[
            ("GET", "sms", Gated),
            ("GET", "cache", Gated),
            ("GET", "crypt", Gated),
            ("GET", "log", Gated),
            ("GET", "storage", Gated),
            ("PUT", "sms", Gated),
            ("PUT", "crypt-jwt", Gated),
            ("PUT", "cache-redis", Gated),
            ("PUT", "cache-default", Gated),
            ("PUT", "storage-default", Gated),
            ("POST", "test-sms-email", Gated),
            ("POST", "test-redis", Gated),
        ],
    ),
    Resource::crud("tags", "Tags", Common),
    Resource::crud("pages", "Pages", Common),
    Resource::crud("level", "Levels", Common),
    Resource::crud("banner", "Banners", Common),
    Resource::crud("article", "Articles", Common),
    Resource::crud("placard", "Placards", Common),
    Resource::crud("auth-pages", "Page permissions", Common),
    Resource::crud("links-group", "Link groups", Common),
    Resource::crud("config", "Config", Common).with_reads_only(&["one", "all", "count", "column"]),
    Resource::crud("users", "Users", Common).with_extra(&[
        ("PUT", "update", Login),
        ("PUT", "email", Login),
        ("PUT", "phone", Login),
        ("PUT", "status", Login),
        ("DELETE", "destroy", Login),
    ]),
    Resource::crud("links", "Links", Common).with_writes(Login),
    Resource::crud("comment", "Comments", Common)
        .with_writes(Login)
        .with_extra(&[("GET", "flat", Common)]),
    Resource::crud("article-group", "Article groups", Common).with_extra(&[("GET", "tree", Common)]),
    Resource::crud("exp", "Experience", Common).with_extra(&[
        ("GET", "active", Common),
        ("POST", "check-in", Login),
        ("POST", "share", Login),
        ("POST", "collect", Login),
        ("POST", "like", Login),
    ]),
    Resource::crud("api-keys", "API keys", Gated),
    Resource::crud("auth-group", "Permission groups", Gated).with_extra(&[("PUT", "uids", Gated)]),
    Resource::crud("auth-rules", "Permission rules", Gated),
    Resource::crud("qps-warn", "QPS warnings", Gated),
    Resource::crud("ip-black", "IP blacklist", Gated),
    Resource::custom(
        "upgrade",
        "Upgrade",
        &[("POST", "theme", Gated), ("POST", "system", Gated)],
    ),
    Resource::custom(
        "search",
        "Search",
        &[
            ("GET", "article", Common),
            ("GET", "pages", Common),
            ("GET", "tags", Common),
            ("GET", "all", Common),
        ],
    ),
];

fn route_of(resource: &str, action: &str) -> String {
    if action.is_empty() {
        format!("/api/{resource}")
    } else {
        format!("/api/{resource}/{action}")
    }
}

/// The built-in route table, sorted by route then method.
#[must_use]
pub fn route_table() -> Vec<SeedRoute> {
    let mut table: BTreeMap<(String, &'static str), SeedRoute> = BTreeMap::new();
    let mut put = |resource: &Resource, method: &'static str, action: &str, class: RequirementClass| {
        let route = route_of(resource.name, action);
        let name = if action.is_empty() {
            format!("[{}] {method}", resource.label)
        } else {
            format!("[{}] {action}", resource.label)
        };
        table.insert(
            (route.clone(), method),
            SeedRoute {
                method,
                route,
                class,
                name,
            },
        );
    };

    for resource in RESOURCES {
        if let Some(class) = resource.reads {
            let actions: &[&str] = resource.read_subset.unwrap_or(&READS);
            for action in actions {
                put(resource, "GET", *action, class);
            }
        }
        if let Some(class) = resource.writes {
            for (method, actions) in WRITES {
                for action in actions {
                    put(resource, method, *action, class);
                }
            }
        }
        for &(method, action, class) in resource.extra {
            put(resource, method, action, class);
        }
    }

    table.into_values().collect()
}

/// Class the built-in table assigns to `method` on `route`, if listed.
#[must_use]
pub fn seeded_class(method: &str, route: &str) -> Option<RequirementClass> {
    let method = method.to_ascii_uppercase();
    route_table()
        .into_iter()
        .find(|seed| seed.method == method && seed.route == route)
        .map(|seed| seed.class)
}

/// Insert every built-in rule the store does not have yet.
///
/// Existing rows are left alone, so their hashes are never recomputed.
/// Returns the number inserted.
///
/// # Errors
///
/// Returns the first store error.
pub async fn seed_rules(adapters: &Adapters) -> StoreResult<usize> {
    let store = adapters.store();
    let mut inserted = 0;

    for seed in route_table() {
        if adapters
            .store_call("insert_rule", store.insert_rule(seed.to_rule()))
            .await?
        {
            inserted += 1;
        }
    }

    if inserted > 0 {
        info!(inserted, "Seeded permission rules");
    } else {
        debug!("Permission rules already seeded");
    }
    Ok(inserted)
}

/// Create the super-administrator group on an empty store.
///
/// Group 1 holds identity 1, grants every rule and is root. Returns
/// `true` if it was created.
///
/// # Errors
///
/// Returns the first store error.
pub async fn bootstrap_root_group(adapters: &Adapters) -> StoreResult<bool> {
    let store = adapters.store();
    if adapters.store_call("count_groups", store.count_groups()).await? > 0 {
        return Ok(false);
    }

    let group = PermissionGroup::new(1, "super administrators")
        .with_members([1])
        .with_rules(RuleSet::All)
        .as_root();
    adapters
        .store_call("save_group", store.save_group(group))
        .await?;

    info!("Created super administrator group");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Cache, GateStore, MemoryCache, MemoryStore, Timeouts};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn adapters() -> (Adapters, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let adapters = Adapters::new(
            Arc::clone(&store) as Arc<dyn GateStore>,
            Arc::new(MemoryCache::new()) as Arc<dyn Cache>,
            Timeouts::default(),
        );
        (adapters, store)
    }

    #[test]
    fn test_route_table_has_unique_hashes() {
        let table = route_table();
        let hashes: HashSet<_> = table.iter().map(|s| s.to_rule().hash().clone()).collect();
        assert_eq!(hashes.len(), table.len());
    }

    #[test]
    fn test_seeded_classes() {
        assert_eq!(seeded_class("GET", "/api/tags/all"), Some(Common));
        assert_eq!(seeded_class("post", "/api/comm/login"), Some(Common));
        assert_eq!(seeded_class("POST", "/api/comment/save"), Some(Login));
        assert_eq!(seeded_class("PUT", "/api/users/update"), Some(Login));
        assert_eq!(seeded_class("PUT", "/api/users/restore"), Some(Gated));
        assert_eq!(seeded_class("GET", "/api/ip-black/all"), Some(Gated));
        assert_eq!(seeded_class("GET", "/api/test"), Some(Common));
        assert_eq!(seeded_class("GET", "/api/config/rand"), None);
        assert_eq!(seeded_class("GET", "/nowhere"), None);
    }

    #[tokio::test]
    async fn test_seed_rules_is_idempotent() {
        let (adapters, store) = adapters();
        let first = seed_rules(&adapters).await.unwrap();
        assert_eq!(first, route_table().len());
        assert_eq!(store.rule_count(), first);

        assert_eq!(seed_rules(&adapters).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_root_group_once() {
        let (adapters, store) = adapters();
        assert!(bootstrap_root_group(&adapters).await.unwrap());
        assert!(!bootstrap_root_group(&adapters).await.unwrap());

        let root = store.fetch_group(1).await.unwrap().unwrap();
        assert!(root.root);
        assert_eq!(root.rules, RuleSet::All);
        assert_eq!(root.members.to_string(), "|1|");
    }
}
