//! Balancer Smart Order Router
//!
//! This crate quotes swaps across Balancer V2 and V3 pools: weighted, stable,
//! Gyro 2-CLP and E-CLP pools, nested BPT hops and ERC4626 buffers, reproducing
//! the vaults' fixed-point math to the wei.

pub mod allocator;
pub mod cache;
pub mod error;
pub mod fixed_point;
pub mod graph;
pub mod hooks;
pub mod log_exp;
pub mod math;
pub mod path;
pub mod pools;
pub mod price_impact;
pub mod records;
pub mod router;
pub mod signed_fixed_point;
pub mod source;
pub mod token;
pub mod vault;

#[cfg(test)]
mod fixtures;

// Re-exports
pub use allocator::{allocate, AllocatorConfig};
pub use cache::{CacheKey, Clock, ManualClock, PoolDataCache, SystemClock};
pub use error::{Result, SorError};
pub use graph::{build_pool_graph, find_candidate_paths, PoolEdge, PoolGraph};
pub use hooks::{HookParams, HookState};
pub use path::{BalanceArena, Path, PathWithAmount};
pub use pools::{Pool, PoolState, PoolType};
pub use price_impact::{estimate_price_impact, PriceImpact};
pub use records::{PoolRecord, PoolSet, PoolSnapshot, TokenRecord};
pub use router::{select_protocol_version, SmartOrderRouter, SwapRequest, SwapResult, VersionQuote};
pub use source::{InMemoryPoolSource, JsonFilePoolSource, PoolSource};
pub use token::{Token, TokenAmount};
