//! Data Transfer Objects for API requests and responses
//!
//! Monetary amounts cross the wire as raw integer strings in the token's own
//! decimals.

use balancer::{PathWithAmount, PoolState, PriceImpact, SorError, SwapRequest, SwapResult};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sor_core::{Address, Chain, GraphTraversalConfig, ProtocolVersion, SwapKind};

/// GET /health response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache_ttl_secs: u64,
    /// Pool snapshots currently served from cache
    pub cached_snapshots: Vec<CachedSnapshotDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSnapshotDto {
    pub chain: Chain,
    pub protocol_version: ProtocolVersion,
    pub consider_pools_with_hooks: bool,
}

/// POST /sor/quote body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub chain: Chain,
    pub token_in: String,
    pub token_out: String,
    pub swap_kind: SwapKind,
    /// Raw integer in the given token's decimals
    pub amount: String,
    #[serde(default)]
    pub protocol_version: Option<ProtocolVersion>,
    #[serde(default)]
    pub pool_ids: Option<Vec<String>>,
    #[serde(default)]
    pub consider_pools_with_hooks: bool,
    #[serde(default)]
    pub graph_traversal_config: Option<GraphTraversalConfig>,
}

impl TryFrom<QuoteRequest> for SwapRequest {
    type Error = ApiError;

    fn try_from(request: QuoteRequest) -> Result<Self, Self::Error> {
        let address = |value: &str| {
            Address::parse(value).map_err(|e| ApiError::bad_request(e.to_string()))
        };
        let amount = U256::from_dec_str(&request.amount).map_err(|_| {
            ApiError::bad_request(format!(
                "amount must be a raw integer, got {:?}",
                request.amount
            ))
        })?;
        Ok(SwapRequest {
            chain: request.chain,
            token_in: address(&request.token_in)?,
            token_out: address(&request.token_out)?,
            swap_kind: request.swap_kind,
            amount,
            protocol_version: request.protocol_version,
            pool_ids: request.pool_ids,
            consider_pools_with_hooks: request.consider_pools_with_hooks,
            graph_traversal_config: request.graph_traversal_config,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDto {
    pub address: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathDto {
    pub pools: Vec<String>,
    pub tokens: Vec<TokenDto>,
    pub is_buffer: Vec<bool>,
    pub input_amount_raw: String,
    pub output_amount_raw: String,
}

impl From<PathWithAmount> for PathDto {
    fn from(path: PathWithAmount) -> Self {
        Self {
            tokens: path
                .path
                .tokens
                .iter()
                .map(|t| TokenDto {
                    address: t.address.to_string(),
                    decimals: t.decimals,
                })
                .collect(),
            pools: path.path.pool_ids,
            is_buffer: path.path.is_buffer,
            input_amount_raw: path.input_amount.amount.to_string(),
            output_amount_raw: path.output_amount.amount.to_string(),
        }
    }
}

/// POST /sor/quote response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub protocol_version: ProtocolVersion,
    pub swap_kind: SwapKind,
    pub paths: Vec<PathDto>,
    pub token_in_amount_raw: String,
    pub token_out_amount_raw: String,
    pub return_amount_raw: String,
    pub effective_price: String,
    pub price_impact: PriceImpact,
}

impl From<SwapResult> for QuoteResponse {
    fn from(result: SwapResult) -> Self {
        Self {
            protocol_version: result.protocol_version,
            swap_kind: result.swap_kind,
            paths: result.paths.into_iter().map(Into::into).collect(),
            token_in_amount_raw: result.token_in_amount.to_string(),
            token_out_amount_raw: result.token_out_amount.to_string(),
            return_amount_raw: result.return_amount.to_string(),
            effective_price: result.effective_price,
            price_impact: result.price_impact,
        }
    }
}

/// GET /sor/pools query
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolsQuery {
    pub chain: Chain,
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub consider_pools_with_hooks: bool,
    /// Report every pool as carrying this hook type
    #[serde(default)]
    pub hook_name: Option<String>,
}

/// GET /sor/pools response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolsResponse {
    pub chain: Chain,
    pub protocol_version: ProtocolVersion,
    pub pools: Vec<PoolState>,
    pub count: usize,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "bad_request", message)
    }
}

impl From<SorError> for ApiError {
    fn from(err: SorError) -> Self {
        Self::new(err.status_code(), err.error_code(), err.to_string())
    }
}
