//! Pool snapshot sources
//!
//! The ETL writes one JSON snapshot per chain and vault version; the router
//! only ever reads them.

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

use sor_core::{Chain, DataSourceError, ProtocolVersion};
use tracing::debug;

use crate::records::PoolSnapshot;

/// Where pool snapshots come from
pub trait PoolSource: Send + Sync {
    fn fetch_pools(
        &self,
        chain: Chain,
        version: ProtocolVersion,
    ) -> impl Future<Output = Result<PoolSnapshot, DataSourceError>> + Send;
}

/// Reads `{data_dir}/{chain}-v{version}.json`, e.g. `mainnet-v3.json`.
#[derive(Debug, Clone)]
pub struct JsonFilePoolSource {
    data_dir: PathBuf,
}

impl JsonFilePoolSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn snapshot_path(&self, chain: Chain, version: ProtocolVersion) -> PathBuf {
        self.data_dir.join(format!(
            "{}-v{}.json",
            chain.as_str().to_ascii_lowercase(),
            version.as_u8()
        ))
    }
}

impl PoolSource for JsonFilePoolSource {
    async fn fetch_pools(
        &self,
        chain: Chain,
        version: ProtocolVersion,
    ) -> Result<PoolSnapshot, DataSourceError> {
        let path = self.snapshot_path(chain, version);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DataSourceError::SnapshotMissing {
                    chain: chain.to_string(),
                    version: version.to_string(),
                })
            }
            Err(e) => {
                return Err(DataSourceError::Unreachable {
                    source_name: format!("{}: {}", path.display(), e),
                })
            }
        };
        let snapshot: PoolSnapshot = serde_json::from_str(&raw)
            .map_err(|e| DataSourceError::ParseError(format!("{}: {}", path.display(), e)))?;
        debug!(
            path = %path.display(),
            pools = snapshot.pools.len(),
            "Loaded pool snapshot"
        );
        Ok(snapshot)
    }
}

/// Fixed snapshots held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryPoolSource {
    snapshots: HashMap<(Chain, ProtocolVersion), PoolSnapshot>,
}

impl InMemoryPoolSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(
        mut self,
        chain: Chain,
        version: ProtocolVersion,
        snapshot: PoolSnapshot,
    ) -> Self {
        self.snapshots.insert((chain, version), snapshot);
        self
    }
}

impl PoolSource for InMemoryPoolSource {
    async fn fetch_pools(
        &self,
        chain: Chain,
        version: ProtocolVersion,
    ) -> Result<PoolSnapshot, DataSourceError> {
        self.snapshots
            .get(&(chain, version))
            .cloned()
            .ok_or_else(|| DataSourceError::SnapshotMissing {
                chain: chain.to_string(),
                version: version.to_string(),
            })
    }
}
