//! Natural exponent and logarithm over 18-decimal fixed point
//!
//! Port of the vault's exp/log approximation. Intermediates run on signed big
//! integers so negative logarithms and 36-decimal precision need no tricks.
//! Division truncates toward zero, as on-chain signed division does.

use std::sync::OnceLock;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::signed_fixed_point::{to_bigint, to_u256};

struct Constants {
    one_18: BigInt,
    one_20: BigInt,
    one_36: BigInt,
    max_natural_exponent: BigInt,
    min_natural_exponent: BigInt,
    ln_36_lower_bound: BigInt,
    ln_36_upper_bound: BigInt,
    mild_exponent_bound: BigInt,
    x0: BigInt,
    a0: BigInt,
    x1: BigInt,
    a1: BigInt,
    /// (x_n, a_n) for n = 2..=11, 20 decimals
    table: Vec<(BigInt, BigInt)>,
}

fn int(digits: &str) -> BigInt {
    // Literals below are all valid decimal strings.
    BigInt::parse_bytes(digits.as_bytes(), 10).unwrap_or_default()
}

fn constants() -> &'static Constants {
    static CONSTANTS: OnceLock<Constants> = OnceLock::new();
    CONSTANTS.get_or_init(|| {
        let one_18 = int("1000000000000000000");
        let one_20 = int("100000000000000000000");
        let one_36 = int("1000000000000000000000000000000000000");
        let two_254: BigInt = BigInt::one() << 254;
        Constants {
            max_natural_exponent: int("130") * &one_18,
            min_natural_exponent: int("-41") * &one_18,
            ln_36_lower_bound: &one_18 - int("100000000000000000"),
            ln_36_upper_bound: &one_18 + int("100000000000000000"),
            mild_exponent_bound: two_254 / &one_20,
            x0: int("128000000000000000000"),
            a0: int("38877084059945950922200000000000000000000000000000000000"),
            x1: int("64000000000000000000"),
            a1: int("6235149080811616882910000000"),
            table: vec![
                (int("3200000000000000000000"), int("7896296018268069516100000000000000")),
                (int("1600000000000000000000"), int("888611052050787263676000000")),
                (int("800000000000000000000"), int("298095798704172827474000")),
                (int("400000000000000000000"), int("5459815003314423907810")),
                (int("200000000000000000000"), int("738905609893065022723")),
                (int("100000000000000000000"), int("271828182845904523536")),
                (int("50000000000000000000"), int("164872127070012814685")),
                (int("25000000000000000000"), int("128402541668774148407")),
                (int("12500000000000000000"), int("113314845306682631683")),
                (int("6250000000000000000"), int("106449445891785942956")),
            ],
            one_18,
            one_20,
            one_36,
        }
    })
}

/// `x^y` for scale18 `x` and `y`.
pub fn pow(x: U256, y: U256) -> Result<U256> {
    if y.is_zero() {
        return Ok(crate::fixed_point::ONE);
    }
    if x.is_zero() {
        return Ok(U256::zero());
    }
    if x.bit(255) {
        return Err(SorError::ExponentOutOfBounds);
    }

    let c = constants();
    let x = to_bigint(x);
    let y = to_bigint(y);
    if y >= c.mild_exponent_bound {
        return Err(SorError::ExponentOutOfBounds);
    }

    let logx_times_y = if c.ln_36_lower_bound < x && x < c.ln_36_upper_bound {
        let ln_36_x = ln_36(&x);
        (&ln_36_x / &c.one_18) * &y + ((&ln_36_x % &c.one_18) * &y) / &c.one_18
    } else {
        ln(&x)? * &y
    };
    let logx_times_y = logx_times_y / &c.one_18;

    if logx_times_y < c.min_natural_exponent || logx_times_y > c.max_natural_exponent {
        return Err(SorError::ExponentOutOfBounds);
    }
    to_u256(&exp(&logx_times_y)?)
}

/// `e^x` for a signed 18-decimal exponent.
pub fn exp(x: &BigInt) -> Result<BigInt> {
    let c = constants();
    if *x < c.min_natural_exponent || *x > c.max_natural_exponent {
        return Err(SorError::ExponentOutOfBounds);
    }
    if x.is_negative() {
        let positive = exp(&-x)?;
        if positive.is_zero() {
            return Err(SorError::DivisionByZero);
        }
        return Ok((&c.one_18 * &c.one_18) / positive);
    }

    let mut x = x.clone();
    let first_an = if x >= c.x0 {
        x -= &c.x0;
        c.a0.clone()
    } else if x >= c.x1 {
        x -= &c.x1;
        c.a1.clone()
    } else {
        BigInt::one()
    };

    // 20 decimals from here on
    x *= 100;

    let mut product = c.one_20.clone();
    // x10 and x11 are only needed by ln
    for (x_n, a_n) in c.table.iter().take(8) {
        if x >= *x_n {
            x -= x_n;
            product = (product * a_n) / &c.one_20;
        }
    }

    let mut series_sum = c.one_20.clone();
    let mut term = x.clone();
    series_sum += &term;
    for divisor in 2..=12u32 {
        term = ((term * &x) / &c.one_20) / divisor;
        series_sum += &term;
    }

    Ok((((product * series_sum) / &c.one_20) * first_an) / 100)
}

/// Natural logarithm of a positive 18-decimal value.
pub fn ln(a: &BigInt) -> Result<BigInt> {
    let c = constants();
    if !a.is_positive() {
        return Err(SorError::ExponentOutOfBounds);
    }
    if *a < c.one_18 {
        let inverted = (&c.one_18 * &c.one_18) / a;
        return Ok(-ln(&inverted)?);
    }

    let mut a = a.clone();
    let mut sum = BigInt::zero();
    if a >= &c.a0 * &c.one_18 {
        a /= &c.a0;
        sum += &c.x0;
    }
    if a >= &c.a1 * &c.one_18 {
        a /= &c.a1;
        sum += &c.x1;
    }

    sum *= 100;
    a *= 100;

    for (x_n, a_n) in &c.table {
        if a >= *a_n {
            a = (a * &c.one_20) / a_n;
            sum += x_n;
        }
    }

    let z = ((&a - &c.one_20) * &c.one_20) / (&a + &c.one_20);
    let z_squared = (&z * &z) / &c.one_20;

    let mut num = z.clone();
    let mut series_sum = num.clone();
    for divisor in [3u32, 5, 7, 9, 11] {
        num = (num * &z_squared) / &c.one_20;
        series_sum += &num / divisor;
    }
    series_sum *= 2;

    Ok((sum + series_sum) / 100)
}

/// High precision logarithm for arguments close to one, 36 decimals out.
fn ln_36(x: &BigInt) -> BigInt {
    let c = constants();
    let x = x * &c.one_18;

    let z = ((&x - &c.one_36) * &c.one_36) / (&x + &c.one_36);
    let z_squared = (&z * &z) / &c.one_36;

    let mut num = z.clone();
    let mut series_sum = num.clone();
    for divisor in [3u32, 5, 7, 9, 11, 13, 15] {
        num = (num * &z_squared) / &c.one_36;
        series_sum += &num / divisor;
    }

    series_sum * 2
}
