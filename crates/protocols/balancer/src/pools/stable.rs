//! Stable pools (composable and meta-stable included)

use primitive_types::U256;
use sor_core::SwapKind;

use super::{BasePool, PoolCommon};
use crate::error::{Result, SorError};
use crate::fixed_point::{self, div_down, mul_down, mul_up, Rounding};
use crate::math::base_pool::InvariantMath;
use crate::math::stable as math;

/// Limit on GivenOut swaps, as a share of the out balance
const MAX_OUT_SHARE: U256 = U256([990_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone)]
pub struct StablePool {
    pub common: PoolCommon,
    /// Amplification times `AMP_PRECISION`
    pub amp: U256,
}

impl StablePool {
    pub fn new(common: PoolCommon, amp: U256) -> Result<Self> {
        if amp.is_zero() {
            return Err(SorError::InvalidPoolData {
                pool_id: common.id.clone(),
                reason: "zero amplification".into(),
            });
        }
        Ok(Self { common, amp })
    }
}

impl InvariantMath for StablePool {
    fn compute_invariant(&self, balances: &[U256], rounding: Rounding) -> Result<U256> {
        let invariant = math::compute_invariant(self.amp, balances)?;
        match rounding {
            Rounding::Up if !invariant.is_zero() => fixed_point::add(invariant, U256::one()),
            _ => Ok(invariant),
        }
    }

    fn compute_balance(
        &self,
        balances: &[U256],
        token_index: usize,
        invariant_ratio: U256,
    ) -> Result<U256> {
        let invariant = mul_up(self.compute_invariant(balances, Rounding::Up)?, invariant_ratio)?;
        math::compute_balance(self.amp, balances, invariant, token_index)
    }

    fn min_invariant_ratio(&self) -> U256 {
        math::MIN_INVARIANT_RATIO
    }

    fn max_invariant_ratio(&self) -> U256 {
        math::MAX_INVARIANT_RATIO
    }
}

impl BasePool for StablePool {
    fn on_swap(
        &self,
        kind: SwapKind,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
        amount: U256,
    ) -> Result<U256> {
        let invariant = math::compute_invariant(self.amp, balances)?;
        match kind {
            SwapKind::GivenIn => math::compute_out_given_exact_in(
                self.amp, balances, index_in, index_out, amount, invariant,
            ),
            SwapKind::GivenOut => math::compute_in_given_exact_out(
                self.amp, balances, index_in, index_out, amount, invariant,
            ),
        }
    }

    fn limit_amount_swap(&self, index_in: usize, index_out: usize, kind: SwapKind) -> Result<U256> {
        let token_in = &self.common.tokens[index_in];
        let token_out = &self.common.tokens[index_out];
        match kind {
            // any amount in yields something out; cap at the out side valued in token in
            SwapKind::GivenIn => {
                let in_scale18 = div_down(token_out.live_balance()?, token_in.rate)?;
                fixed_point::div(in_scale18, token_in.scaling_factor()?)
            }
            SwapKind::GivenOut => mul_down(token_out.balance.amount, MAX_OUT_SHARE),
        }
    }

    fn normalized_liquidity(&self, _index_in: usize, index_out: usize) -> Result<U256> {
        fixed_point::div(
            fixed_point::mul(self.common.tokens[index_out].live_balance()?, self.amp)?,
            math::AMP_PRECISION,
        )
    }

    fn invariant_math(&self) -> Option<&dyn InvariantMath> {
        Some(self)
    }

    fn amp(&self) -> Option<U256> {
        Some(self.amp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::ONE;
    use crate::fixtures::{amount, stable_pool, token_a, token_b};
    use sor_core::ProtocolVersion;

    #[test]
    fn test_limits() {
        let pool = stable_pool(ProtocolVersion::V2, "52110", "51290", 1000, "0.001");
        let limit_in = pool
            .get_limit_amount_swap(&token_a(), &token_b(), SwapKind::GivenIn)
            .unwrap();
        // 51290 B expressed in 6-decimal A
        assert_eq!(limit_in, U256::from(51_290_000_000u64));
        let limit_out = pool
            .get_limit_amount_swap(&token_a(), &token_b(), SwapKind::GivenOut)
            .unwrap();
        assert_eq!(limit_out, U256::from(507_771u64) * ONE / 10);
    }

    #[test]
    fn test_given_in_then_given_out_creates_no_value() {
        let pool = stable_pool(ProtocolVersion::V2, "52110", "51290", 1000, "0.001");
        let amount_in = amount(&token_a(), "1000");
        let out = pool.swap_given_in(&token_a(), &token_b(), &amount_in).unwrap();
        let back = pool.swap_given_out(&token_a(), &token_b(), &out).unwrap();

        assert!(back.amount >= amount_in.amount);
        // gap is bounded by the fee on both legs plus solver tolerance
        let gap = back.amount - amount_in.amount;
        assert!(gap <= U256::from(3_000_000u64), "gap = {}", gap);
    }

    #[test]
    fn test_near_peg_output() {
        let pool = stable_pool(ProtocolVersion::V2, "52110", "51290", 1000, "0.001");
        let out = pool
            .swap_given_in(&token_a(), &token_b(), &amount(&token_a(), "1000"))
            .unwrap();
        // ~0.1% fee on a deep amplified curve
        assert!(out.amount < U256::from(999u64) * ONE);
        assert!(out.amount > U256::from(998u64) * ONE);
    }

    #[test]
    fn test_zero_amp_is_rejected() {
        let pool = stable_pool(ProtocolVersion::V2, "1", "1", 1, "0");
        let common = pool.common().clone();
        assert!(StablePool::new(common, U256::zero()).is_err());
    }
}
