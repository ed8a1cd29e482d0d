//! 2-CLP pools

use primitive_types::U256;
use sor_core::SwapKind;

use super::{BasePool, PoolCommon};
use crate::error::{Result, SorError};
use crate::fixed_point::{self, div_down, mul_down, Rounding};
use crate::math::base_pool::InvariantMath;
use crate::math::gyro2 as math;

/// Share of the out balance a single swap may take
const MAX_OUT_SHARE: U256 = U256([990_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone)]
pub struct Gyro2Pool {
    pub common: PoolCommon,
    pub sqrt_alpha: U256,
    pub sqrt_beta: U256,
}

impl Gyro2Pool {
    pub fn new(common: PoolCommon, sqrt_alpha: U256, sqrt_beta: U256) -> Result<Self> {
        if common.tokens.len() != 2 {
            return Err(SorError::InvalidPoolData {
                pool_id: common.id.clone(),
                reason: format!("2-CLP with {} tokens", common.tokens.len()),
            });
        }
        if sqrt_alpha.is_zero() || sqrt_alpha >= sqrt_beta {
            return Err(SorError::InvalidPoolData {
                pool_id: common.id.clone(),
                reason: "sqrtAlpha must be positive and below sqrtBeta".into(),
            });
        }
        Ok(Self {
            common,
            sqrt_alpha,
            sqrt_beta,
        })
    }

    /// Virtual offsets ordered as (in, out)
    fn virtual_offsets(&self, balances: &[U256], index_in: usize) -> Result<(U256, U256)> {
        let invariant = math::calculate_invariant(
            &[balances[0], balances[1]],
            self.sqrt_alpha,
            self.sqrt_beta,
            Rounding::Down,
        )?;
        let offset0 = math::virtual_offset0(invariant, self.sqrt_beta)?;
        let offset1 = math::virtual_offset1(invariant, self.sqrt_alpha)?;
        Ok(if index_in == 0 {
            (offset0, offset1)
        } else {
            (offset1, offset0)
        })
    }
}

impl BasePool for Gyro2Pool {
    fn on_swap(
        &self,
        kind: SwapKind,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
        amount: U256,
    ) -> Result<U256> {
        let (offset_in, offset_out) = self.virtual_offsets(balances, index_in)?;
        match kind {
            SwapKind::GivenIn => math::calc_out_given_in(
                balances[index_in],
                balances[index_out],
                amount,
                offset_in,
                offset_out,
            ),
            SwapKind::GivenOut => math::calc_in_given_out(
                balances[index_in],
                balances[index_out],
                amount,
                offset_in,
                offset_out,
            ),
        }
    }

    fn limit_amount_swap(&self, index_in: usize, index_out: usize, kind: SwapKind) -> Result<U256> {
        concentrated_limit(self, &self.common, index_in, index_out, kind)
    }

    fn normalized_liquidity(&self, index_in: usize, index_out: usize) -> Result<U256> {
        let balances = self.common.live_balances()?;
        let (_, offset_out) = self.virtual_offsets(&balances, index_in)?;
        Ok(fixed_point::add(balances[index_out], offset_out)? / 2)
    }

    fn invariant_math(&self) -> Option<&dyn InvariantMath> {
        None
    }
}

/// Limits shared by the concentrated curves: 99% of the out balance, and for
/// GivenIn the input that buys it.
pub(super) fn concentrated_limit(
    curve: &dyn BasePool,
    common: &PoolCommon,
    index_in: usize,
    index_out: usize,
    kind: SwapKind,
) -> Result<U256> {
    let token_in = &common.tokens[index_in];
    let token_out = &common.tokens[index_out];
    let max_out = mul_down(token_out.balance.amount, MAX_OUT_SHARE)?;
    match kind {
        SwapKind::GivenOut => Ok(max_out),
        SwapKind::GivenIn => {
            let balances = common.live_balances()?;
            let max_out_live = mul_down(
                fixed_point::mul(max_out, token_out.scaling_factor()?)?,
                token_out.rate,
            )?;
            let in_live = curve.on_swap(SwapKind::GivenOut, &balances, index_in, index_out, max_out_live)?;
            fixed_point::div(div_down(in_live, token_in.rate)?, token_in.scaling_factor()?)
        }
    }
}
