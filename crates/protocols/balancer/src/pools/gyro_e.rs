//! E-CLP pools

use primitive_types::U256;
use sor_core::SwapKind;

use super::gyro2::concentrated_limit;
use super::{BasePool, PoolCommon};
use crate::error::{Result, SorError};
use crate::fixed_point;
use crate::math::base_pool::InvariantMath;
use crate::math::gyro_e::{self as math, DerivedEclpParams, EclpParams};
use crate::signed_fixed_point::to_u256;

#[derive(Debug, Clone)]
pub struct GyroEPool {
    pub common: PoolCommon,
    pub params: EclpParams,
    pub derived: DerivedEclpParams,
}

impl GyroEPool {
    /// Derived parameters are computed from `params` when the snapshot omits them.
    pub fn new(
        common: PoolCommon,
        params: EclpParams,
        derived: Option<DerivedEclpParams>,
    ) -> Result<Self> {
        if common.tokens.len() != 2 {
            return Err(SorError::InvalidPoolData {
                pool_id: common.id.clone(),
                reason: format!("E-CLP with {} tokens", common.tokens.len()),
            });
        }
        let derived = match derived {
            Some(derived) => derived,
            None => DerivedEclpParams::from_params(&params)?,
        };
        Ok(Self {
            common,
            params,
            derived,
        })
    }

    fn pair(balances: &[U256]) -> [U256; 2] {
        [balances[0], balances[1]]
    }
}

impl BasePool for GyroEPool {
    fn on_swap(
        &self,
        kind: SwapKind,
        balances: &[U256],
        index_in: usize,
        _index_out: usize,
        amount: U256,
    ) -> Result<U256> {
        let balances = Self::pair(balances);
        let invariant = math::invariant_vector(&balances, &self.params, &self.derived)?;
        let token_in_is_token0 = index_in == 0;
        match kind {
            SwapKind::GivenIn => math::calc_out_given_in(
                &balances,
                amount,
                token_in_is_token0,
                &self.params,
                &self.derived,
                &invariant,
            ),
            SwapKind::GivenOut => math::calc_in_given_out(
                &balances,
                amount,
                token_in_is_token0,
                &self.params,
                &self.derived,
                &invariant,
            ),
        }
    }

    fn limit_amount_swap(&self, index_in: usize, index_out: usize, kind: SwapKind) -> Result<U256> {
        concentrated_limit(self, &self.common, index_in, index_out, kind)
    }

    fn normalized_liquidity(&self, _index_in: usize, index_out: usize) -> Result<U256> {
        let balances = Self::pair(&self.common.live_balances()?);
        let invariant = math::invariant_vector(&balances, &self.params, &self.derived)?;
        let offset = if index_out == 0 {
            math::virtual_offset0(&self.params, &self.derived, &invariant)?
        } else {
            math::virtual_offset1(&self.params, &self.derived, &invariant)?
        };
        Ok(fixed_point::add(balances[index_out], to_u256(&offset)?)? / 2)
    }

    fn invariant_math(&self) -> Option<&dyn InvariantMath> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::ONE;
    use crate::fixtures::{amount, gyro_e_pool, token_a, token_b};
    use sor_core::ProtocolVersion;

    #[test]
    fn test_swap_both_directions() {
        let pool = gyro_e_pool(ProtocolVersion::V2, "1000", "1000", "0.001");
        let amount_in = amount(&token_a(), "1");
        let out = pool.swap_given_in(&token_a(), &token_b(), &amount_in).unwrap();
        assert!(!out.is_zero());
        assert!(out.amount < U256::from(2u64) * ONE);

        let back = pool.swap_given_out(&token_a(), &token_b(), &out).unwrap();
        assert!(back.amount >= amount_in.amount);
    }

    #[test]
    fn test_derived_params_filled_in() {
        let pool = gyro_e_pool(ProtocolVersion::V2, "1000", "1000", "0.001");
        let (common, params) = match pool {
            crate::pools::Pool::GyroE(p) => (p.common, p.params),
            _ => unreachable!(),
        };
        let expected = DerivedEclpParams::from_params(&params).unwrap();
        let built = GyroEPool::new(common, params, None).unwrap();
        assert_eq!(built.derived, expected);
    }

    #[test]
    fn test_given_out_beyond_balance_is_rejected() {
        let pool = gyro_e_pool(ProtocolVersion::V2, "1000", "1000", "0.001");
        let result = pool.swap_given_out(&token_a(), &token_b(), &amount(&token_b(), "995"));
        assert!(matches!(result, Err(e) if e.is_infeasible()));
    }
}
