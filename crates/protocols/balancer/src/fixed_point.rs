//! Scale18 fixed-point kernel
//!
//! Unsigned 256-bit values scaled by 1e18. Rounding direction is always explicit:
//! `*_down` truncates, `*_up` rounds away from zero, matching the vault contracts
//! bit for bit.

use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::log_exp;

/// 1.0 in scale18
pub const ONE: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);

/// 2.0 in scale18
pub const TWO: U256 = U256([2_000_000_000_000_000_000, 0, 0, 0]);

/// 4.0 in scale18
pub const FOUR: U256 = U256([4_000_000_000_000_000_000, 0, 0, 0]);

/// Relative error bound applied around `pow` results (1e-14)
pub const MAX_POW_RELATIVE_ERROR: U256 = U256([10_000, 0, 0, 0]);

/// Rounding direction for operations that take it as a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

pub fn add(a: U256, b: U256) -> Result<U256> {
    a.checked_add(b).ok_or(SorError::MathOverflow)
}

pub fn sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(SorError::MathUnderflow)
}

pub fn mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b).ok_or(SorError::MathOverflow)
}

pub fn div(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    Ok(a / b)
}

pub fn mul_down(a: U256, b: U256) -> Result<U256> {
    Ok(mul(a, b)? / ONE)
}

pub fn mul_up(a: U256, b: U256) -> Result<U256> {
    let product = mul(a, b)?;
    if product.is_zero() {
        return Ok(U256::zero());
    }
    Ok((product - 1) / ONE + 1)
}

pub fn div_down(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    Ok(mul(a, ONE)? / b)
}

pub fn div_up(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    if a.is_zero() {
        return Ok(U256::zero());
    }
    Ok((mul(a, ONE)? - 1) / b + 1)
}

/// Integer division rounding up, no scaling.
pub fn div_up_raw(a: U256, b: U256) -> Result<U256> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    if a.is_zero() {
        return Ok(U256::zero());
    }
    Ok((a - 1) / b + 1)
}

/// `a * b / c` rounded up, no scaling.
pub fn mul_div_up(a: U256, b: U256, c: U256) -> Result<U256> {
    if c.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    let product = mul(a, b)?;
    if product.is_zero() {
        return Ok(U256::zero());
    }
    Ok((product - 1) / c + 1)
}

/// `1 - x`, saturating at zero.
pub fn complement(x: U256) -> U256 {
    if x < ONE {
        ONE - x
    } else {
        U256::zero()
    }
}

pub fn pow_down(x: U256, y: U256) -> Result<U256> {
    if y == ONE {
        return Ok(x);
    }
    if y == TWO {
        return mul_down(x, x);
    }
    if y == FOUR {
        let square = mul_down(x, x)?;
        return mul_down(square, square);
    }
    let raw = log_exp::pow(x, y)?;
    let max_error = add(mul_up(raw, MAX_POW_RELATIVE_ERROR)?, U256::one())?;
    Ok(raw.saturating_sub(max_error))
}

pub fn pow_up(x: U256, y: U256) -> Result<U256> {
    if y == ONE {
        return Ok(x);
    }
    if y == TWO {
        return mul_up(x, x);
    }
    if y == FOUR {
        let square = mul_up(x, x)?;
        return mul_up(square, square);
    }
    let raw = log_exp::pow(x, y)?;
    let max_error = add(mul_up(raw, MAX_POW_RELATIVE_ERROR)?, U256::one())?;
    add(raw, max_error)
}

/// Floor square root of a scale18 value, returned in scale18.
pub fn sqrt(x: U256) -> Result<U256> {
    if x.is_zero() {
        return Ok(U256::zero());
    }
    Ok(mul(x, ONE)?.integer_sqrt())
}

/// `10^(18 - decimals)`
pub fn scaling_factor(decimals: u8) -> Result<U256> {
    if decimals > 18 {
        return Err(SorError::InvalidNumber {
            value: decimals.to_string(),
            reason: "token decimals above 18".into(),
        });
    }
    Ok(U256::exp10(usize::from(18 - decimals)))
}

/// Parse a human decimal string ("52110.25") into raw units with `decimals`
/// fractional digits. Extra fractional digits are truncated.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256> {
    let invalid = |reason: &str| SorError::InvalidNumber {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("negative"));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid("no digits"));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid("not a decimal number"));
    }

    let decimals = usize::from(decimals);
    let mut digits = String::with_capacity(int_part.len() + decimals);
    digits.push_str(int_part);
    if frac_part.len() >= decimals {
        digits.push_str(&frac_part[..decimals]);
    } else {
        digits.push_str(frac_part);
        digits.extend(std::iter::repeat('0').take(decimals - frac_part.len()));
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| invalid("does not fit in 256 bits"))
}

/// Render raw units as a human decimal string, trimming trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}
