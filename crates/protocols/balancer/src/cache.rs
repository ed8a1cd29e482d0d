//! Short-lived pool snapshot cache
//!
//! One entry per (chain, version, hook inclusion). Concurrent callers for the
//! same key share a single in-flight fetch; failed fetches leave the entry
//! empty so the next caller tries again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use sor_core::{Chain, ProtocolVersion, RouterConfig};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::error::{Result, SorError};
use crate::records::PoolSnapshot;
use crate::source::PoolSource;

/// Time source for expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: StdMutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Instant {
        self.as_ref().now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub chain: Chain,
    pub protocol_version: ProtocolVersion,
    pub consider_pools_with_hooks: bool,
}

type Slot = Arc<OnceCell<(Arc<PoolSnapshot>, Instant)>>;

/// Eligible pool snapshots keyed by [`CacheKey`]
pub struct PoolDataCache<S, C = SystemClock> {
    source: S,
    clock: C,
    ttl: Duration,
    config: RouterConfig,
    entries: Mutex<HashMap<CacheKey, Slot>>,
}

impl<S: PoolSource> PoolDataCache<S, SystemClock> {
    pub fn new(source: S, config: RouterConfig) -> Self {
        Self::with_clock(source, config, SystemClock)
    }
}

impl<S: PoolSource, C: Clock> PoolDataCache<S, C> {
    pub fn with_clock(source: S, config: RouterConfig, clock: C) -> Self {
        Self {
            source,
            clock,
            ttl: Duration::from_secs(config.cache_ttl_secs),
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Eligible pools for `key`. A non-empty `pool_ids` filter skips the cache
    /// and always fetches.
    pub async fn get(&self, key: CacheKey, pool_ids: Option<&[String]>) -> Result<Arc<PoolSnapshot>> {
        if let Some(ids) = pool_ids.filter(|ids| !ids.is_empty()) {
            debug!(
                chain = %key.chain,
                version = %key.protocol_version,
                ids = ids.len(),
                "Fetching filtered pools, cache bypassed"
            );
            let snapshot = self.fetch(key).await?.with_pool_ids(ids);
            return Ok(Arc::new(snapshot));
        }

        let slot = self.slot(key).await;
        let (snapshot, _) = slot
            .get_or_try_init(|| async {
                let snapshot = self.fetch(key).await?;
                Ok::<_, SorError>((Arc::new(snapshot), self.clock.now()))
            })
            .await?;
        Ok(snapshot.clone())
    }

    /// Live slot for `key`, replacing an expired one. Slots still being filled
    /// or left empty by a failure are reused.
    async fn slot(&self, key: CacheKey) -> Slot {
        let mut entries = self.entries.lock().await;
        let now = self.clock.now();
        if let Some(slot) = entries.get(&key) {
            let expired = slot
                .get()
                .map(|(_, fetched_at)| now.saturating_duration_since(*fetched_at) >= self.ttl)
                .unwrap_or(false);
            if !expired {
                return slot.clone();
            }
            debug!(chain = %key.chain, version = %key.protocol_version, "Pool cache entry expired");
        }
        let slot: Slot = Arc::new(OnceCell::new());
        entries.insert(key, slot.clone());
        slot
    }

    async fn fetch(&self, key: CacheKey) -> Result<PoolSnapshot> {
        let snapshot = self
            .source
            .fetch_pools(key.chain, key.protocol_version)
            .await?;
        Ok(snapshot.eligible(key.consider_pools_with_hooks, &self.config))
    }

    /// Keys holding a fetched, unexpired snapshot
    pub async fn cached_keys(&self) -> Vec<CacheKey> {
        let entries = self.entries.lock().await;
        let now = self.clock.now();
        let mut keys: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, slot)| match slot.get() {
                Some((_, fetched_at)) => now.saturating_duration_since(*fetched_at) < self.ttl,
                None => false,
            })
            .map(|(key, _)| *key)
            .collect();
        keys.sort_by_key(|key| (key.chain, key.protocol_version, key.consider_pools_with_hooks));
        keys
    }
}
