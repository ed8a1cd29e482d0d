//! Signed fixed point for elliptic-curve pool math
//!
//! Normal precision values carry 18 decimals, extra precision ("xp") values carry 38.
//! `*_mag` variants round the magnitude (toward or away from zero) rather than the
//! signed value.

use num_bigint::{BigInt, Sign};
use num_traits::{Signed, Zero};
use primitive_types::U256;

use crate::error::{Result, SorError};

pub fn to_bigint(value: U256) -> BigInt {
    let mut bytes = Vec::with_capacity(32);
    for limb in value.0 {
        bytes.extend_from_slice(&limb.to_le_bytes());
    }
    BigInt::from_bytes_le(Sign::Plus, &bytes)
}

pub fn to_u256(value: &BigInt) -> Result<U256> {
    if value.is_negative() {
        return Err(SorError::MathUnderflow);
    }
    let (_, bytes) = value.to_bytes_le();
    if bytes.len() > 32 {
        return Err(SorError::MathOverflow);
    }
    let mut padded = [0u8; 32];
    padded[..bytes.len()].copy_from_slice(&bytes);
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let mut chunk = [0u8; 8];
        chunk.copy_from_slice(&padded[i * 8..(i + 1) * 8]);
        *limb = u64::from_le_bytes(chunk);
    }
    Ok(U256(limbs))
}

/// Parse a signed human decimal into an integer with `decimals` fractional digits.
pub fn parse_signed(value: &str, decimals: u8) -> Result<BigInt> {
    let trimmed = value.trim();
    let (negative, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let parsed = to_bigint(crate::fixed_point::parse_units(magnitude, decimals)?);
    Ok(if negative { -parsed } else { parsed })
}

pub fn one() -> BigInt {
    BigInt::from(1_000_000_000_000_000_000i64)
}

pub fn one_xp() -> BigInt {
    BigInt::from(10).pow(38)
}

fn e19() -> BigInt {
    BigInt::from(10_000_000_000_000_000_000u64)
}

pub fn mul_down_mag(a: &BigInt, b: &BigInt) -> BigInt {
    (a * b) / one()
}

pub fn mul_up_mag(a: &BigInt, b: &BigInt) -> BigInt {
    let product = a * b;
    if product.is_positive() {
        (product - 1) / one() + 1
    } else if product.is_negative() {
        (product + 1) / one() - 1
    } else {
        BigInt::zero()
    }
}

pub fn div_down_mag(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    Ok((a * one()) / b)
}

pub fn div_up_mag(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    if a.is_zero() {
        return Ok(BigInt::zero());
    }
    let (a, b) = if b.is_negative() {
        (-a, -b)
    } else {
        (a.clone(), b.clone())
    };
    if a.is_positive() {
        Ok((a * one() - 1) / b + 1)
    } else {
        Ok((a * one() + 1) / b - 1)
    }
}

pub fn mul_xp(a: &BigInt, b: &BigInt) -> BigInt {
    (a * b) / one_xp()
}

pub fn div_xp(a: &BigInt, b: &BigInt) -> Result<BigInt> {
    if b.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    if a.is_zero() {
        return Ok(BigInt::zero());
    }
    Ok((a * one_xp()) / b)
}

/// Normal precision `a` times extra precision `b`, rounded toward negative infinity.
pub fn mul_down_xp_to_np(a: &BigInt, b: &BigInt) -> BigInt {
    let b1 = b / e19();
    let b2 = b % e19();
    let prod1 = a * b1;
    let prod2 = a * b2;
    if !prod1.is_negative() && !prod2.is_negative() {
        (prod1 + prod2 / e19()) / e19()
    } else {
        (prod1 + prod2 / e19() + 1) / e19() - 1
    }
}

/// Normal precision `a` times extra precision `b`, rounded toward positive infinity.
pub fn mul_up_xp_to_np(a: &BigInt, b: &BigInt) -> BigInt {
    let b1 = b / e19();
    let b2 = b % e19();
    let prod1 = a * b1;
    let prod2 = a * b2;
    if !prod1.is_positive() && !prod2.is_positive() {
        (prod1 + prod2 / e19()) / e19()
    } else {
        (prod1 + prod2 / e19() - 1) / e19() + 1
    }
}

/// Floor square root of a non-negative 18-decimal value, result in 18 decimals.
pub fn sqrt(value: &BigInt) -> Result<BigInt> {
    if value.is_negative() {
        return Err(SorError::MathUnderflow);
    }
    Ok((value * one()).sqrt())
}
