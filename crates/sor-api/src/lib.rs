//! sor-api: HTTP API layer for the smart order router
//!
//! Exposes quoting and pool inspection over JSON.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::AppState;
