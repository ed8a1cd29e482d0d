//! Router error taxonomy

use sor_core::DataSourceError;
use thiserror::Error;

/// Errors raised while simulating pools or building quotes
#[derive(Debug, Error)]
pub enum SorError {
    // -- data errors: the snapshot is corrupt or incompatible --
    #[error("Pool {pool_id} does not contain the given tokens")]
    TokensNotInPool { pool_id: String },

    #[error("Invalid pool data for {pool_id}: {reason}")]
    InvalidPoolData { pool_id: String, reason: String },

    #[error("Invalid number {value:?}: {reason}")]
    InvalidNumber { value: String, reason: String },

    #[error("Unknown token {0}")]
    UnknownToken(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Token mismatch: {expected} vs {actual}")]
    TokenMismatch { expected: String, actual: String },

    // -- arithmetic bounds: this pool cannot serve this amount --
    #[error("Asset bounds exceeded")]
    AssetBoundsExceeded,

    #[error("Swap amount exceeds the pool limit")]
    SwapLimitExceeded,

    #[error("Amount in exceeds max in ratio")]
    MaxInRatio,

    #[error("Amount out exceeds max out ratio")]
    MaxOutRatio,

    #[error("Stable invariant did not converge")]
    StableInvariantDidNotConverge,

    #[error("Stable balance did not converge")]
    StableGetBalanceDidNotConverge,

    #[error("Invariant ratio out of bounds")]
    InvariantRatioOutOfBounds,

    #[error("Zero invariant")]
    ZeroInvariant,

    #[error("Trade amount too small")]
    TradeAmountTooSmall,

    #[error("Exponent out of bounds")]
    ExponentOutOfBounds,

    #[error("Max assets exceeded")]
    MaxAssetsExceeded,

    #[error("Max invariant exceeded")]
    MaxInvariantExceeded,

    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    // -- external --
    #[error("Pool data unavailable: {0}")]
    Fetch(#[from] DataSourceError),
}

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, SorError>;

impl SorError {
    /// Arithmetic and bound failures mean "no liquidity for this amount" and are
    /// absorbed into zero-amount paths. Everything else aborts the quote.
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            Self::AssetBoundsExceeded
                | Self::SwapLimitExceeded
                | Self::MaxInRatio
                | Self::MaxOutRatio
                | Self::StableInvariantDidNotConverge
                | Self::StableGetBalanceDidNotConverge
                | Self::InvariantRatioOutOfBounds
                | Self::ZeroInvariant
                | Self::TradeAmountTooSmall
                | Self::ExponentOutOfBounds
                | Self::MaxAssetsExceeded
                | Self::MaxInvariantExceeded
                | Self::MathOverflow
                | Self::MathUnderflow
                | Self::DivisionByZero
        )
    }

    /// Get an HTTP-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TokensNotInPool { .. } => "tokens_not_in_pool",
            Self::InvalidPoolData { .. } => "invalid_pool_data",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::UnknownToken(_) => "unknown_token",
            Self::InvalidRequest(_) => "invalid_request",
            Self::TokenMismatch { .. } => "token_mismatch",
            Self::Fetch(e) => e.error_code(),
            _ => "infeasible_amount",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnknownToken(_) | Self::InvalidRequest(_) | Self::InvalidNumber { .. } => 400,
            Self::TokensNotInPool { .. }
            | Self::InvalidPoolData { .. }
            | Self::TokenMismatch { .. } => 502,
            Self::Fetch(e) => e.status_code(),
            _ => 422,
        }
    }
}
