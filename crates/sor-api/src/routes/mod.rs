//! API route handlers

pub mod health;
pub mod sor;

use axum::{routing::get, Router};
use balancer::PoolSource;

use crate::AppState;

/// Create the API router with all routes
pub fn create_router<S: PoolSource + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health::health_check::<S>))
        .nest("/sor", sor::router())
        .with_state(state)
}
