//! Constant weighted product math

use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::fixed_point::{
    add, complement, div_down, div_up, mul_down, mul_up, pow_down, pow_up, sub, Rounding, ONE,
};

/// Swaps may not move more than 30% of a balance in one go.
pub const MAX_IN_RATIO: U256 = U256([300_000_000_000_000_000, 0, 0, 0]);
pub const MAX_OUT_RATIO: U256 = U256([300_000_000_000_000_000, 0, 0, 0]);

/// Bounds on invariant growth/shrink for single-token liquidity operations.
pub const MIN_INVARIANT_RATIO: U256 = U256([700_000_000_000_000_000, 0, 0, 0]);
pub const MAX_INVARIANT_RATIO: U256 = U256([3_000_000_000_000_000_000, 0, 0, 0]);

pub fn calc_out_given_in(
    balance_in: U256,
    weight_in: U256,
    balance_out: U256,
    weight_out: U256,
    amount_in: U256,
) -> Result<U256> {
    if amount_in > mul_down(balance_in, MAX_IN_RATIO)? {
        return Err(SorError::MaxInRatio);
    }

    let denominator = add(balance_in, amount_in)?;
    let base = div_up(balance_in, denominator)?;
    let exponent = div_down(weight_in, weight_out)?;
    let power = pow_up(base, exponent)?;

    mul_down(balance_out, complement(power))
}

pub fn calc_in_given_out(
    balance_in: U256,
    weight_in: U256,
    balance_out: U256,
    weight_out: U256,
    amount_out: U256,
) -> Result<U256> {
    if amount_out > mul_down(balance_out, MAX_OUT_RATIO)? {
        return Err(SorError::MaxOutRatio);
    }

    let base = div_up(balance_out, sub(balance_out, amount_out)?)?;
    let exponent = div_up(weight_out, weight_in)?;
    let power = pow_up(base, exponent)?;

    // power >= 1 since base >= 1
    let ratio = sub(power, ONE)?;
    mul_up(balance_in, ratio)
}

/// `prod(balance_i ^ weight_i)`
pub fn compute_invariant(weights: &[U256], balances: &[U256], rounding: Rounding) -> Result<U256> {
    let mut invariant = ONE;
    for (balance, weight) in balances.iter().zip(weights) {
        invariant = match rounding {
            Rounding::Down => mul_down(invariant, pow_down(*balance, *weight)?)?,
            Rounding::Up => mul_up(invariant, pow_up(*balance, *weight)?)?,
        };
    }
    if invariant.is_zero() {
        return Err(SorError::ZeroInvariant);
    }
    Ok(invariant)
}

/// Balance of one token after the invariant is scaled by `invariant_ratio`.
pub fn compute_balance_out_given_invariant(
    current_balance: U256,
    weight: U256,
    invariant_ratio: U256,
) -> Result<U256> {
    let balance_ratio = pow_up(invariant_ratio, div_up(ONE, weight)?)?;
    mul_up(current_balance, balance_ratio)
}
