//! Application state shared across API handlers

use std::sync::Arc;

use balancer::{PoolDataCache, PoolSource, SmartOrderRouter};
use sor_core::AppConfig;

/// Shared application state
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    config: AppConfig,
    router: SmartOrderRouter<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: PoolSource> AppState<S> {
    /// Build the cache and router over `source`
    pub fn new(config: AppConfig, source: S) -> Self {
        let cache = Arc::new(PoolDataCache::new(source, config.router.clone()));
        tracing::info!(
            ttl_secs = config.router.cache_ttl_secs,
            "Pool data cache ready"
        );
        Self {
            inner: Arc::new(AppStateInner {
                router: SmartOrderRouter::new(cache),
                config,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn router(&self) -> &SmartOrderRouter<S> {
        &self.inner.router
    }
}
