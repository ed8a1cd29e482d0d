//! Error types for the router workspace

use thiserror::Error;

/// Core errors shared across crates
#[derive(Debug, Error)]
pub enum Error {
    #[error("Data source error: {0}")]
    DataSource(#[from] DataSourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failures of the external pool-data layer
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("Pool data source unreachable: {source_name}")]
    Unreachable { source_name: String },

    #[error("No pool snapshot for {chain} {version}")]
    SnapshotMissing { chain: String, version: String },

    #[error("Failed to parse pool snapshot: {0}")]
    ParseError(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

impl DataSourceError {
    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => "data_source_unreachable",
            Self::SnapshotMissing { .. } => "snapshot_missing",
            Self::ParseError(_) => "snapshot_parse_error",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unreachable { .. } => 503,
            Self::SnapshotMissing { .. } => 404,
            Self::ParseError(_) => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_error_codes() {
        let err = DataSourceError::Unreachable {
            source_name: "snapshots".into(),
        };
        assert_eq!(err.error_code(), "data_source_unreachable");
        assert_eq!(err.status_code(), 503);

        let err = DataSourceError::SnapshotMissing {
            chain: "MAINNET".into(),
            version: "v3".into(),
        };
        assert_eq!(err.error_code(), "snapshot_missing");
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_error_from_data_source() {
        let err: Error = DataSourceError::ParseError("bad json".into()).into();
        assert!(err.to_string().contains("bad json"));
    }
}
