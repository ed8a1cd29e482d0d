//! ERC4626 buffers: wrap and unwrap at the vault's rate, no fee, no curve

use primitive_types::U256;
use sor_core::{Chain, ProtocolVersion, SwapKind};

use super::{LiquidityManagement, PoolCommon, PoolToken};
use crate::error::{Result, SorError};
use crate::fixed_point::{self, div_down, div_up, mul_down, mul_up, ONE};
use crate::token::Token;

const WRAPPED: usize = 0;
const UNDERLYING: usize = 1;

#[derive(Debug, Clone)]
pub struct BufferPool {
    /// `tokens[0]` is the wrapped share, `tokens[1]` the underlying asset
    pub common: PoolCommon,
    /// Underlying assets per wrapped share, scale18
    pub rate: U256,
    /// Rate used when redeeming, when it differs from `rate`
    pub unwrap_rate: Option<U256>,
}

impl BufferPool {
    pub fn new(
        chain: Chain,
        wrapped: Token,
        underlying: Token,
        rate: U256,
        unwrap_rate: Option<U256>,
    ) -> Result<Self> {
        let id = format!("buffer-{}", wrapped.address);
        if rate.is_zero() || unwrap_rate.is_some_and(|r| r.is_zero()) {
            return Err(SorError::InvalidPoolData {
                pool_id: id,
                reason: "zero ERC4626 rate".into(),
            });
        }
        let address = wrapped.address.clone();
        let common = PoolCommon {
            id,
            address,
            chain,
            protocol_version: ProtocolVersion::V3,
            swap_fee: U256::zero(),
            tokens: vec![
                PoolToken::new(wrapped, WRAPPED, U256::zero(), ONE)?,
                PoolToken::new(underlying, UNDERLYING, U256::zero(), ONE)?,
            ],
            total_shares: U256::zero(),
            hook: None,
            liquidity_management: LiquidityManagement::default(),
        };
        Ok(Self {
            common,
            rate,
            unwrap_rate,
        })
    }

    pub fn wrapped(&self) -> &Token {
        &self.common.tokens[WRAPPED].token
    }

    pub fn underlying(&self) -> &Token {
        &self.common.tokens[UNDERLYING].token
    }

    /// Convert `amount` (raw, on the fixed side) across the buffer.
    pub fn swap(
        &self,
        kind: SwapKind,
        token_in: &Token,
        token_out: &Token,
        amount: U256,
    ) -> Result<U256> {
        let wrapping = if token_in == self.underlying() && token_out == self.wrapped() {
            true
        } else if token_in == self.wrapped() && token_out == self.underlying() {
            false
        } else {
            return Err(SorError::TokensNotInPool {
                pool_id: self.common.id.clone(),
            });
        };
        if amount.is_zero() {
            return Ok(U256::zero());
        }

        let unwrap_rate = self.unwrap_rate.unwrap_or(self.rate);
        let scale_in = fixed_point::scaling_factor(token_in.decimals)?;
        let scale_out = fixed_point::scaling_factor(token_out.decimals)?;

        match kind {
            SwapKind::GivenIn => {
                let given = fixed_point::mul(amount, scale_in)?;
                let out = if wrapping {
                    div_down(given, self.rate)?
                } else {
                    mul_down(given, unwrap_rate)?
                };
                fixed_point::div(out, scale_out)
            }
            SwapKind::GivenOut => {
                let given = fixed_point::mul(amount, scale_out)?;
                let amount_in = if wrapping {
                    mul_up(given, self.rate)?
                } else {
                    div_up(given, unwrap_rate)?
                };
                fixed_point::div_up_raw(amount_in, scale_in)
            }
        }
    }
}
