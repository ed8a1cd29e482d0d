//! 2-CLP math: a constant product curve on virtual balances, concentrated between
//! `alpha` and `beta` (passed as their square roots).

use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::fixed_point::{
    add, div_down, div_up, mul_down, mul_up, sqrt, sub, Rounding, ONE, TWO,
};

/// Round the input-side virtual offset up by this factor.
const VIRTUAL_IN_FACTOR: U256 = U256([1_000_000_000_000_000_002, 0, 0, 0]);
/// Round the output-side virtual offset down by this factor.
const VIRTUAL_OUT_FACTOR: U256 = U256([999_999_999_999_999_999, 0, 0, 0]);

fn mul_r(a: U256, b: U256, rounding: Rounding) -> Result<U256> {
    match rounding {
        Rounding::Down => mul_down(a, b),
        Rounding::Up => mul_up(a, b),
    }
}

fn div_r(a: U256, b: U256, rounding: Rounding) -> Result<U256> {
    match rounding {
        Rounding::Down => div_down(a, b),
        Rounding::Up => div_up(a, b),
    }
}

/// Solve `L^2 (1 - sqrtA/sqrtB) - L (y/sqrtB + x sqrtA) - xy = 0` for `L`.
pub fn calculate_invariant(
    balances: &[U256; 2],
    sqrt_alpha: U256,
    sqrt_beta: U256,
    rounding: Rounding,
) -> Result<U256> {
    let (x, y) = (balances[0], balances[1]);
    let opposite = match rounding {
        Rounding::Down => Rounding::Up,
        Rounding::Up => Rounding::Down,
    };

    // `a` sits in the denominator: rounding the ratio with `rounding` moves `a` the other way
    let a = sub(ONE, div_r(sqrt_alpha, sqrt_beta, rounding)?)?;
    let mb = add(
        div_r(y, sqrt_beta, rounding)?,
        mul_r(x, sqrt_alpha, rounding)?,
    )?;
    let mc = mul_r(x, y, rounding)?;

    // b^2 expanded: x^2 alpha + 2xy sqrt(alpha/beta) + y^2 / beta
    let b_sq1 = mul_r(mul_r(mul_r(x, x, rounding)?, sqrt_alpha, rounding)?, sqrt_alpha, rounding)?;
    let b_sq2 = div_r(
        mul_r(mul_r(mul_r(x, y, rounding)?, TWO, rounding)?, sqrt_alpha, rounding)?,
        sqrt_beta,
        rounding,
    )?;
    let b_sq3 = div_r(
        mul_r(y, y, rounding)?,
        mul_r(sqrt_beta, sqrt_beta, opposite)?,
        rounding,
    )?;
    let b_square = add(add(b_sq1, b_sq2)?, b_sq3)?;

    let denominator = mul_r(a, TWO, opposite)?;
    let add_term = mul_r(mul_r(mc, U256::from(4) * ONE, rounding)?, a, rounding)?;
    let radicand = add(b_square, add_term)?;
    let numerator = add(mb, sqrt(radicand)?)?;

    div_r(numerator, denominator, rounding)
}

/// Virtual offset of token 0: `L / sqrt(beta)`
pub fn virtual_offset0(invariant: U256, sqrt_beta: U256) -> Result<U256> {
    div_down(invariant, sqrt_beta)
}

/// Virtual offset of token 1: `L * sqrt(alpha)`
pub fn virtual_offset1(invariant: U256, sqrt_alpha: U256) -> Result<U256> {
    mul_down(invariant, sqrt_alpha)
}

pub fn calc_out_given_in(
    balance_in: U256,
    balance_out: U256,
    amount_in: U256,
    virtual_offset_in: U256,
    virtual_offset_out: U256,
) -> Result<U256> {
    let virt_in_over = add(balance_in, mul_up(virtual_offset_in, VIRTUAL_IN_FACTOR)?)?;
    let virt_out_under = add(balance_out, mul_down(virtual_offset_out, VIRTUAL_OUT_FACTOR)?)?;

    let amount_out = div_down(
        mul_down(virt_out_under, amount_in)?,
        add(virt_in_over, amount_in)?,
    )?;
    if amount_out > balance_out {
        return Err(SorError::AssetBoundsExceeded);
    }
    Ok(amount_out)
}

pub fn calc_in_given_out(
    balance_in: U256,
    balance_out: U256,
    amount_out: U256,
    virtual_offset_in: U256,
    virtual_offset_out: U256,
) -> Result<U256> {
    if amount_out > balance_out {
        return Err(SorError::AssetBoundsExceeded);
    }
    let virt_in_over = add(balance_in, mul_up(virtual_offset_in, VIRTUAL_IN_FACTOR)?)?;
    let virt_out_under = add(balance_out, mul_down(virtual_offset_out, VIRTUAL_OUT_FACTOR)?)?;

    div_up(
        mul_up(virt_in_over, amount_out)?,
        sub(virt_out_under, amount_out)?,
    )
}
