//! Liveness plus a view of what the pool cache currently holds

use axum::{extract::State, Json};
use balancer::PoolSource;

use crate::dto::{CachedSnapshotDto, HealthResponse};
use crate::AppState;

/// GET /health
pub async fn health_check<S: PoolSource + 'static>(
    State(state): State<AppState<S>>,
) -> Json<HealthResponse> {
    let cache = state.router().cache();
    let cached = cache
        .cached_keys()
        .await
        .into_iter()
        .map(|key| CachedSnapshotDto {
            chain: key.chain,
            protocol_version: key.protocol_version,
            consider_pools_with_hooks: key.consider_pools_with_hooks,
        })
        .collect();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache_ttl_secs: cache.config().cache_ttl_secs,
        cached_snapshots: cached,
    })
}
