//! Invariant math per pool family
//!
//! All functions operate on live scale18 balances and amounts; fees, scaling and
//! rates are applied by the callers.

pub mod base_pool;
pub mod gyro2;
pub mod gyro_e;
pub mod stable;
pub mod weighted;
