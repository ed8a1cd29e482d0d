//! Configuration types for the router

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, HookType, Result};

/// Limits applied while enumerating candidate paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphTraversalConfig {
    /// Hop limit for paths that cross at least one buffer edge
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Hop limit for paths made only of pool swaps
    #[serde(default = "default_max_non_boosted_path_depth")]
    pub max_non_boosted_path_depth: usize,

    /// Number of ranked candidate paths handed to the allocator
    #[serde(default = "default_approx_paths_to_return")]
    pub approx_paths_to_return: usize,

    /// Intermediate tokens of a boosted path not touched by a buffer edge
    #[serde(default = "default_max_non_boosted_hop_tokens")]
    pub max_non_boosted_hop_tokens_in_boosted_path: usize,
}

fn default_max_depth() -> usize {
    6
}

fn default_max_non_boosted_path_depth() -> usize {
    4
}

fn default_approx_paths_to_return() -> usize {
    5
}

fn default_max_non_boosted_hop_tokens() -> usize {
    2
}

impl Default for GraphTraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_non_boosted_path_depth: default_max_non_boosted_path_depth(),
            approx_paths_to_return: default_approx_paths_to_return(),
            max_non_boosted_hop_tokens_in_boosted_path: default_max_non_boosted_hop_tokens(),
        }
    }
}

/// Smart order router settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Lifetime of a cached pool snapshot
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Default traversal limits, overridable per request
    #[serde(default)]
    pub graph: GraphTraversalConfig,

    /// Upper bound for the depth used by the single retry
    #[serde(default = "default_max_search_depth")]
    pub max_search_depth: usize,

    /// Edges retained per directed token pair
    #[serde(default = "default_max_pools_per_pair")]
    pub max_pools_per_pair: usize,

    /// Partial paths kept per search level
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,

    /// Slices the requested amount is cut into by the allocator
    #[serde(default = "default_allocation_steps")]
    pub allocation_steps: usize,

    /// Paths considered when splitting an amount
    #[serde(default = "default_max_paths_in_split")]
    pub max_paths_in_split: usize,

    /// Pools below this USD liquidity are ignored
    #[serde(default)]
    pub min_liquidity_usd: f64,

    /// Pool ids never routed through
    #[serde(default)]
    pub excluded_pool_ids: Vec<String>,

    /// Hooked pools of this type are routed even when hooks are not requested
    #[serde(default = "default_always_included_hook")]
    pub always_included_hook: Option<HookType>,
}

fn default_cache_ttl_secs() -> u64 {
    5
}

fn default_max_search_depth() -> usize {
    7
}

fn default_max_pools_per_pair() -> usize {
    5
}

fn default_beam_width() -> usize {
    64
}

fn default_allocation_steps() -> usize {
    10
}

fn default_max_paths_in_split() -> usize {
    3
}

fn default_always_included_hook() -> Option<HookType> {
    Some(HookType::StableSurge)
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            graph: GraphTraversalConfig::default(),
            max_search_depth: default_max_search_depth(),
            max_pools_per_pair: default_max_pools_per_pair(),
            beam_width: default_beam_width(),
            allocation_steps: default_allocation_steps(),
            max_paths_in_split: default_max_paths_in_split(),
            min_liquidity_usd: 0.0,
            excluded_pool_ids: Vec::new(),
            always_included_hook: default_always_included_hook(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the pool snapshots written by the ETL
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Router settings
    #[serde(default)]
    pub router: RouterConfig,
}

fn default_api_port() -> u16 {
    19080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            data_dir: default_data_dir(),
            router: RouterConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let graph = &self.router.graph;
        if graph.max_non_boosted_path_depth == 0 || graph.max_depth == 0 {
            return Err(Error::Config("path depths must be at least 1".into()));
        }
        if graph.approx_paths_to_return == 0 {
            return Err(Error::Config("approxPathsToReturn must be at least 1".into()));
        }
        if self.router.allocation_steps == 0 {
            return Err(Error::Config("allocationSteps must be at least 1".into()));
        }
        Ok(())
    }
}
