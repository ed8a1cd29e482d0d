//! Stable (amplified invariant) math
//!
//! Amplification values passed in here already include `AMP_PRECISION`.

use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::fixed_point::{add, div, div_up_raw, mul, sub};

pub const AMP_PRECISION: U256 = U256([1_000, 0, 0, 0]);

pub const MIN_INVARIANT_RATIO: U256 = U256([600_000_000_000_000_000, 0, 0, 0]);
/// 50e18, spread over two limbs
pub const MAX_INVARIANT_RATIO: U256 = U256([13_106_511_852_580_896_768, 2, 0, 0]);

const MAX_ITERATIONS: usize = 255;

fn converged(current: U256, previous: U256) -> bool {
    if current > previous {
        current - previous <= U256::one()
    } else {
        previous - current <= U256::one()
    }
}

/// Newton iteration for the stable invariant `D`.
pub fn compute_invariant(amp: U256, balances: &[U256]) -> Result<U256> {
    let num_tokens = U256::from(balances.len());
    let mut sum = U256::zero();
    for balance in balances {
        sum = add(sum, *balance)?;
    }
    if sum.is_zero() {
        return Ok(U256::zero());
    }

    let mut invariant = sum;
    let amp_times_total = mul(amp, num_tokens)?;

    for _ in 0..MAX_ITERATIONS {
        let mut d_p = invariant;
        for balance in balances {
            d_p = div(mul(d_p, invariant)?, mul(*balance, num_tokens)?)?;
        }

        let previous = invariant;
        let numerator = mul(
            add(div(mul(amp_times_total, sum)?, AMP_PRECISION)?, mul(d_p, num_tokens)?)?,
            invariant,
        )?;
        let denominator = add(
            div(
                mul(sub(amp_times_total, AMP_PRECISION)?, invariant)?,
                AMP_PRECISION,
            )?,
            mul(add(num_tokens, U256::one())?, d_p)?,
        )?;
        invariant = div(numerator, denominator)?;

        if converged(invariant, previous) {
            return Ok(invariant);
        }
    }

    Err(SorError::StableInvariantDidNotConverge)
}

pub fn compute_out_given_exact_in(
    amp: U256,
    balances: &[U256],
    token_index_in: usize,
    token_index_out: usize,
    amount_in: U256,
    invariant: U256,
) -> Result<U256> {
    let mut updated = balances.to_vec();
    updated[token_index_in] = add(updated[token_index_in], amount_in)?;

    let final_balance_out = compute_balance(amp, &updated, invariant, token_index_out)?;

    // one unit in the pool's favour
    sub(sub(balances[token_index_out], final_balance_out)?, U256::one())
}

pub fn compute_in_given_exact_out(
    amp: U256,
    balances: &[U256],
    token_index_in: usize,
    token_index_out: usize,
    amount_out: U256,
    invariant: U256,
) -> Result<U256> {
    let mut updated = balances.to_vec();
    updated[token_index_out] = sub(updated[token_index_out], amount_out)?;

    let final_balance_in = compute_balance(amp, &updated, invariant, token_index_in)?;

    add(sub(final_balance_in, balances[token_index_in])?, U256::one())
}

/// Solve for the balance of `token_index` that keeps `invariant` given the others.
pub fn compute_balance(
    amp: U256,
    balances: &[U256],
    invariant: U256,
    token_index: usize,
) -> Result<U256> {
    let num_tokens = U256::from(balances.len());
    let amp_times_total = mul(amp, num_tokens)?;

    let mut sum = balances[0];
    let mut p_d = mul(balances[0], num_tokens)?;
    for balance in &balances[1..] {
        p_d = div(mul(mul(p_d, *balance)?, num_tokens)?, invariant)?;
        sum = add(sum, *balance)?;
    }
    sum = sub(sum, balances[token_index])?;

    let inv2 = mul(invariant, invariant)?;
    let c = mul(
        div_up_raw(mul(inv2, AMP_PRECISION)?, mul(amp_times_total, p_d)?)?,
        balances[token_index],
    )?;
    let b = add(sum, mul(div(invariant, amp_times_total)?, AMP_PRECISION)?)?;

    let mut token_balance = div_up_raw(add(inv2, c)?, add(invariant, b)?)?;

    for _ in 0..MAX_ITERATIONS {
        let previous = token_balance;
        let numerator = add(mul(token_balance, token_balance)?, c)?;
        let denominator = sub(add(mul(token_balance, U256::from(2))?, b)?, invariant)?;
        token_balance = div_up_raw(numerator, denominator)?;

        if converged(token_balance, previous) {
            return Ok(token_balance);
        }
    }

    Err(SorError::StableGetBalanceDidNotConverge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::ONE;

    fn scale18(v: u128) -> U256 {
        U256::from(v) * ONE
    }

    fn amp(v: u64) -> U256 {
        U256::from(v) * AMP_PRECISION
    }

    #[test]
    fn test_invariant_ratio_bounds() {
        assert_eq!(MIN_INVARIANT_RATIO, U256::from(6u64) * ONE / 10);
        assert_eq!(MAX_INVARIANT_RATIO, U256::from(50u64) * ONE);
    }

    #[test]
    fn test_balanced_invariant_is_sum() {
        let balances = [scale18(1000), scale18(1000)];
        let invariant = compute_invariant(amp(1000), &balances).unwrap();
        let diff = if invariant > scale18(2000) {
            invariant - scale18(2000)
        } else {
            scale18(2000) - invariant
        };
        assert!(diff <= U256::from(2u64));
    }

    #[test]
    fn test_empty_pool_has_zero_invariant() {
        let balances = [U256::zero(), U256::zero()];
        assert_eq!(compute_invariant(amp(100), &balances).unwrap(), U256::zero());
    }

    #[test]
    fn test_swap_near_peg() {
        let balances = [scale18(1_000_000), scale18(1_000_000)];
        let invariant = compute_invariant(amp(1000), &balances).unwrap();
        let out =
            compute_out_given_exact_in(amp(1000), &balances, 0, 1, scale18(1000), invariant)
                .unwrap();
        // deep stable pool: almost 1:1 but never more than in
        assert!(out < scale18(1000));
        assert!(out > scale18(999));
    }

    #[test]
    fn test_in_given_out_covers_out_given_in() {
        let balances = [scale18(52_110), scale18(51_290)];
        let invariant = compute_invariant(amp(1000), &balances).unwrap();
        let out = compute_out_given_exact_in(amp(1000), &balances, 0, 1, scale18(1000), invariant)
            .unwrap();
        let back = compute_in_given_exact_out(amp(1000), &balances, 0, 1, out, invariant).unwrap();
        let diff = if back > scale18(1000) {
            back - scale18(1000)
        } else {
            scale18(1000) - back
        };
        assert!(diff < U256::from(1_000_000u64), "back = {}", back);
    }

    #[test]
    fn test_zero_balance_fails() {
        let balances = [scale18(100), U256::zero()];
        assert!(compute_invariant(amp(100), &balances).is_err());
    }
}
