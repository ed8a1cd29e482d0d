//! Weighted pools

use primitive_types::U256;
use sor_core::SwapKind;

use super::{BasePool, PoolCommon};
use crate::error::{Result, SorError};
use crate::fixed_point::{self, mul_down, Rounding, ONE};
use crate::math::base_pool::InvariantMath;
use crate::math::weighted as math;

#[derive(Debug, Clone)]
pub struct WeightedPool {
    pub common: PoolCommon,
    /// Normalized weights aligned with `common.tokens`
    pub weights: Vec<U256>,
}

impl WeightedPool {
    pub fn new(common: PoolCommon, weights: Vec<U256>) -> Result<Self> {
        if weights.len() != common.tokens.len() {
            return Err(SorError::InvalidPoolData {
                pool_id: common.id.clone(),
                reason: format!(
                    "{} weights for {} tokens",
                    weights.len(),
                    common.tokens.len()
                ),
            });
        }
        let total = weights
            .iter()
            .try_fold(U256::zero(), |acc, weight| acc.checked_add(*weight));
        // weights come from decimal strings and may be off by a few wei
        let tolerance = U256::from(1_000u64);
        let in_range = total.is_some_and(|total| {
            total.checked_add(tolerance).is_some_and(|upper| upper >= ONE) && total <= ONE + tolerance
        });
        if !in_range {
            let reason = match total {
                Some(total) => format!("weights sum to {}", fixed_point::format_units(total, 18)),
                None => "weights overflow".to_string(),
            };
            return Err(SorError::InvalidPoolData {
                pool_id: common.id.clone(),
                reason,
            });
        }
        Ok(Self { common, weights })
    }
}

impl InvariantMath for WeightedPool {
    fn compute_invariant(&self, balances: &[U256], rounding: Rounding) -> Result<U256> {
        math::compute_invariant(&self.weights, balances, rounding)
    }

    fn compute_balance(
        &self,
        balances: &[U256],
        token_index: usize,
        invariant_ratio: U256,
    ) -> Result<U256> {
        math::compute_balance_out_given_invariant(
            balances[token_index],
            self.weights[token_index],
            invariant_ratio,
        )
    }

    fn min_invariant_ratio(&self) -> U256 {
        math::MIN_INVARIANT_RATIO
    }

    fn max_invariant_ratio(&self) -> U256 {
        math::MAX_INVARIANT_RATIO
    }
}

impl BasePool for WeightedPool {
    fn on_swap(
        &self,
        kind: SwapKind,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
        amount: U256,
    ) -> Result<U256> {
        match kind {
            SwapKind::GivenIn => math::calc_out_given_in(
                balances[index_in],
                self.weights[index_in],
                balances[index_out],
                self.weights[index_out],
                amount,
            ),
            SwapKind::GivenOut => math::calc_in_given_out(
                balances[index_in],
                self.weights[index_in],
                balances[index_out],
                self.weights[index_out],
                amount,
            ),
        }
    }

    fn limit_amount_swap(&self, index_in: usize, index_out: usize, kind: SwapKind) -> Result<U256> {
        match kind {
            SwapKind::GivenIn => mul_down(
                self.common.tokens[index_in].balance.amount,
                math::MAX_IN_RATIO,
            ),
            SwapKind::GivenOut => mul_down(
                self.common.tokens[index_out].balance.amount,
                math::MAX_OUT_RATIO,
            ),
        }
    }

    fn normalized_liquidity(&self, index_in: usize, index_out: usize) -> Result<U256> {
        let weight_in = self.weights[index_in];
        let weight_out = self.weights[index_out];
        fixed_point::div(
            fixed_point::mul(self.common.tokens[index_out].live_balance()?, weight_in)?,
            fixed_point::add(weight_in, weight_out)?,
        )
    }

    fn invariant_math(&self) -> Option<&dyn InvariantMath> {
        Some(self)
    }
}
