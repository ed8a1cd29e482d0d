//! HTTP server setup

use std::net::SocketAddr;

use axum::{
    http::{header, Method},
    Router,
};
use balancer::PoolSource;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::routes::create_router;
use crate::AppState;

/// Router with request tracing and CORS for the quote and pool endpoints
pub fn create_app<S: PoolSource + 'static>(state: AppState<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve on the configured port until the listener fails
pub async fn start_server<S: PoolSource + 'static>(
    state: AppState<S>,
) -> Result<(), std::io::Error> {
    let config = state.config();
    let addr = SocketAddr::from(([127, 0, 0, 1], config.api_port));
    tracing::info!(
        %addr,
        cache_ttl_secs = config.router.cache_ttl_secs,
        max_depth = config.router.graph.max_depth,
        max_paths_in_split = config.router.max_paths_in_split,
        "Quote API listening"
    );

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
