//! The deny-list check that runs before everything else.

use super::config::BlacklistConfig;
use crate::store::{Adapters, BlacklistEntry, StoreResult};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Cache tag carried by list responses derived from the blacklist.
pub const BLACKLIST_TAG: &str = "ip-black";

#[derive(Debug, Default)]
struct Snapshot {
    ips: HashSet<String>,
    loaded_at: Option<Instant>,
    /// After a failed reload, no new attempt is made before this instant.
    retry_at: Option<Instant>,
}

/// Blacklisted IPs, held in process and reloaded from the store when stale.
///
/// Reads hit the snapshot only. Refreshes and administrative writes are
/// serialized so a `ban` is visible to the very next `check`. A check never
/// waits for another task's reload: it answers from the current snapshot.
/// A failed reload is not retried for one refresh interval.
pub struct BlacklistGate {
    adapters: Adapters,
    config: BlacklistConfig,
    snapshot: RwLock<Snapshot>,
    write_lock: Mutex<()>,
    refresh_failures: AtomicU64,
}

impl std::fmt::Debug for BlacklistGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlacklistGate")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl BlacklistGate {
    /// Create a gate with an empty, stale snapshot.
    #[must_use]
    pub fn new(adapters: Adapters, config: BlacklistConfig) -> Self {
        Self {
            adapters,
            config,
            snapshot: RwLock::new(Snapshot::default()),
            write_lock: Mutex::new(()),
            refresh_failures: AtomicU64::new(0),
        }
    }

    /// Whether `ip` is blacklisted, reloading the snapshot first if stale.
    ///
    /// A failed reload keeps the previous snapshot.
    pub async fn check(&self, ip: &str) -> bool {
        if self.is_stale() {
            if let Ok(_guard) = self.write_lock.try_lock() {
                // Another task may have reloaded before we got the lock.
                if self.is_stale() {
                    if let Err(e) = self.reload().await {
                        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                        self.snapshot.write().retry_at =
                            Some(Instant::now() + self.config.refresh_interval());
                        warn!(ip, stage = "blacklist", error = %e, "Blacklist refresh failed, using last snapshot");
                    }
                }
            }
        }
        self.contains(ip)
    }

    /// Whether `ip` is in the current snapshot. Never touches the store.
    #[must_use]
    pub fn contains(&self, ip: &str) -> bool {
        self.snapshot.read().ips.contains(ip)
    }

    /// Number of IPs in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.read().ips.len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Failed reloads so far.
    #[must_use]
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    fn is_stale(&self) -> bool {
        let snapshot = self.snapshot.read();
        if snapshot.retry_at.is_some_and(|at| Instant::now() < at) {
            return false;
        }
        match snapshot.loaded_at {
            Some(at) => at.elapsed() >= self.config.refresh_interval(),
            None => true,
        }
    }

    /// Reload the snapshot from the store unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous snapshot is kept.
    pub async fn refresh(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.reload().await
    }

    async fn reload(&self) -> StoreResult<()> {
        let store = self.adapters.store();
        let ips = self
            .adapters
            .store_call("blacklisted_ips", store.blacklisted_ips())
            .await?;

        let mut snapshot = self.snapshot.write();
        snapshot.ips = ips.into_iter().collect();
        snapshot.loaded_at = Some(Instant::now());
        snapshot.retry_at = None;
        debug!(entries = snapshot.ips.len(), "Blacklist snapshot reloaded");
        Ok(())
    }

    /// Blacklist an address. Upserts, so banning twice keeps one entry.
    ///
    /// # Errors
    ///
    /// Returns the store error; the snapshot is unchanged on failure.
    pub async fn ban(&self, entry: BlacklistEntry) -> StoreResult<()> {
        let ip = entry.ip.clone();
        {
            let _guard = self.write_lock.lock().await;
            let store = self.adapters.store();
            self.adapters
                .store_call("upsert_blacklist", store.upsert_blacklist(entry))
                .await?;
            self.snapshot.write().ips.insert(ip.clone());
        }

        self.evict_derived().await;
        info!(ip = %ip, "Address blacklisted");
        Ok(())
    }

    /// Lift a ban. Returns `true` if the address was blacklisted.
    ///
    /// # Errors
    ///
    /// Returns the store error; the snapshot is unchanged on failure.
    pub async fn unban(&self, ip: &str) -> StoreResult<bool> {
        let removed = {
            let _guard = self.write_lock.lock().await;
            let store = self.adapters.store();
            let removed = self
                .adapters
                .store_call("remove_blacklist", store.remove_blacklist(ip))
                .await?;
            self.snapshot.write().ips.remove(ip);
            removed
        };

        self.evict_derived().await;
        info!(ip, removed, "Address removed from blacklist");
        Ok(removed)
    }

    async fn evict_derived(&self) {
        if let Err(e) = self.adapters.cache_evict_tag(BLACKLIST_TAG).await {
            debug!(error = %e, "Could not evict cached blacklist responses");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Cache, GateStore, MemoryCache, MemoryStore, Timeouts};
    use std::sync::Arc;
    use std::time::Duration;

    fn gate(refresh_ms: u64) -> (BlacklistGate, Arc<MemoryStore>, Arc<MemoryCache>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let adapters = Adapters::new(
            Arc::clone(&store) as Arc<dyn GateStore>,
            Arc::clone(&cache) as Arc<dyn Cache>,
            Timeouts::default(),
        );
        let gate = BlacklistGate::new(
            adapters,
            BlacklistConfig {
                refresh_interval_ms: refresh_ms,
            },
        );
        (gate, store, cache)
    }

    #[tokio::test]
    async fn test_check_loads_from_store() {
        let (gate, store, _) = gate(60_000);
        store
            .upsert_blacklist(BlacklistEntry::new("10.0.0.1", "manual"))
            .await
            .unwrap();

        assert!(gate.check("10.0.0.1").await);
        assert!(!gate.check("10.0.0.2").await);
        assert_eq!(gate.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_reused_until_stale() {
        let (gate, store, _) = gate(60_000);
        assert!(!gate.check("10.0.0.3").await);

        // Written behind the gate's back; not visible until the next reload.
        store
            .upsert_blacklist(BlacklistEntry::new("10.0.0.3", "manual"))
            .await
            .unwrap();
        assert!(!gate.check("10.0.0.3").await);

        gate.refresh().await.unwrap();
        assert!(gate.check("10.0.0.3").await);
    }

    #[tokio::test]
    async fn test_stale_snapshot_reloads() {
        let (gate, store, _) = gate(10);
        assert!(!gate.check("10.0.0.4").await);

        store
            .upsert_blacklist(BlacklistEntry::new("10.0.0.4", "manual"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gate.check("10.0.0.4").await);
    }

    #[tokio::test]
    async fn test_failed_reload_backs_off() {
        let (gate, store, _) = gate(60_000);
        store.set_offline(true);

        assert!(!gate.check("10.0.0.6").await);
        assert!(!gate.check("10.0.0.6").await);
        assert_eq!(gate.refresh_failures(), 1);

        // Explicit refreshes are not subject to the back-off.
        store.set_offline(false);
        store
            .upsert_blacklist(BlacklistEntry::new("10.0.0.6", "manual"))
            .await
            .unwrap();
        gate.refresh().await.unwrap();
        assert!(gate.check("10.0.0.6").await);
    }

    #[tokio::test]
    async fn test_slow_store_does_not_queue_checks() {
        let (gate, store, _) = gate(60_000);
        store.set_latency(Duration::from_secs(10));
        let gate = Arc::new(gate);

        let started = Instant::now();
        let checks: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.check("10.0.0.7").await })
            })
            .collect();
        for check in checks {
            assert!(!check.await.unwrap());
        }

        // One reload times out; the others answer from the snapshot.
        let bound = Timeouts::default().store;
        assert!(started.elapsed() < bound * 2);
        assert_eq!(gate.refresh_failures(), 1);
    }

    #[tokio::test]
    async fn test_ban_is_read_after_write() {
        let (gate, store, cache) = gate(60_000);
        cache
            .set_tagged("[GET]/api/ip-black/all", serde_json::json!([]), None, &[BLACKLIST_TAG])
            .await
            .unwrap();
        assert!(!gate.check("10.0.0.5").await);

        gate.ban(BlacklistEntry::new("10.0.0.5", "manual"))
            .await
            .unwrap();
        gate.ban(BlacklistEntry::new("10.0.0.5", "manual again"))
            .await
            .unwrap();

        assert!(gate.check("10.0.0.5").await);
        assert_eq!(store.blacklist_entries().len(), 1);
        assert!(!cache.has("[GET]/api/ip-black/all").await.unwrap());

        assert!(gate.unban("10.0.0.5").await.unwrap());
        assert!(!gate.check("10.0.0.5").await);
        assert!(!gate.unban("10.0.0.5").await.unwrap());
    }
}
