//! E-CLP math: liquidity concentrated on a rotated, stretched ellipse.
//!
//! Pool parameters (`alpha`, `beta`, `c`, `s`, `lambda`) are 18-decimal signed values.
//! Derived parameters (`tau_alpha`, `tau_beta`, `u`, `v`, `w`, `z`, `d_sq`) carry 38
//! decimals. Error terms are tracked through the invariant so that every swap is
//! rounded in the pool's favour.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::signed_fixed_point::{
    div_down_mag, div_up_mag, div_xp, mul_down_mag, mul_down_xp_to_np, mul_up_mag,
    mul_up_xp_to_np, mul_xp, one, one_xp, sqrt, to_bigint, to_u256,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EclpParams {
    pub alpha: BigInt,
    pub beta: BigInt,
    pub c: BigInt,
    pub s: BigInt,
    pub lambda: BigInt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vector2 {
    pub x: BigInt,
    pub y: BigInt,
}

impl Vector2 {
    pub fn new(x: BigInt, y: BigInt) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedEclpParams {
    pub tau_alpha: Vector2,
    pub tau_beta: Vector2,
    pub u: BigInt,
    pub v: BigInt,
    pub w: BigInt,
    pub z: BigInt,
    pub d_sq: BigInt,
}

impl DerivedEclpParams {
    /// Compute derived parameters at 38 decimals from the base parameters. Used when a
    /// snapshot omits them.
    pub fn from_params(p: &EclpParams) -> Result<Self> {
        let e20 = BigInt::from(100_000_000_000_000_000_000u128);
        let c = &p.c * &e20;
        let s = &p.s * &e20;

        let tau_alpha = tau(p, &c, &s, &p.alpha)?;
        let tau_beta = tau(p, &c, &s, &p.beta)?;

        let cc = mul_xp(&c, &c);
        let ss = mul_xp(&s, &s);
        let sc = mul_xp(&s, &c);

        Ok(Self {
            u: mul_xp(&sc, &(&tau_beta.x - &tau_alpha.x)),
            v: mul_xp(&ss, &tau_beta.y) + mul_xp(&cc, &tau_alpha.y),
            w: mul_xp(&sc, &(&tau_beta.y - &tau_alpha.y)),
            z: mul_xp(&cc, &tau_beta.x) + mul_xp(&ss, &tau_alpha.x),
            d_sq: cc + ss,
            tau_alpha,
            tau_beta,
        })
    }
}

/// Unit vector on the circle for a price, after undoing the ellipse transform.
fn tau(p: &EclpParams, c_xp: &BigInt, s_xp: &BigInt, price: &BigInt) -> Result<Vector2> {
    let e20 = BigInt::from(100_000_000_000_000_000_000u128);
    let price_xp = price * &e20;
    let numerator = (mul_xp(c_xp, &price_xp) - s_xp) * &p.lambda / one();
    let denominator = c_xp + mul_xp(s_xp, &price_xp);
    let zeta = div_xp(&numerator, &denominator)?;

    let norm = (one_xp() * one_xp() + &zeta * &zeta).sqrt();
    if norm.is_zero() {
        return Err(SorError::DivisionByZero);
    }
    Ok(Vector2::new(
        &zeta * one_xp() / &norm,
        one_xp() * one_xp() / &norm,
    ))
}

fn max_balance_sum() -> BigInt {
    BigInt::from(10).pow(34)
}

fn max_invariant() -> BigInt {
    BigInt::from(3) * BigInt::from(10).pow(37)
}

fn d_sq_pow(d: &DerivedEclpParams, n: usize) -> BigInt {
    let mut acc = d.d_sq.clone();
    for _ in 1..n {
        acc = mul_xp(&acc, &d.d_sq);
    }
    acc
}

/// Invariant together with an upper bound on its rounding error.
pub fn calculate_invariant_with_error(
    balances: &[U256; 2],
    p: &EclpParams,
    d: &DerivedEclpParams,
) -> Result<(BigInt, BigInt)> {
    let x = to_bigint(balances[0]);
    let y = to_bigint(balances[1]);
    if &x + &y > max_balance_sum() {
        return Err(SorError::MaxAssetsExceeded);
    }

    let at_a_chi = calc_at_a_chi(&x, &y, p, d)?;
    let (sqrt_term, mut err) = calc_invariant_sqrt(&x, &y, p, d)?;

    err = if sqrt_term.is_positive() {
        div_up_mag(&(err + 1), &(BigInt::from(2) * &sqrt_term))?
    } else if err.is_positive() {
        sqrt(&err)?
    } else {
        BigInt::from(1_000_000_000u64)
    };
    err = ((mul_up_mag(&p.lambda, &(&x + &y)) / one_xp()) + err + 1) * 20;

    let achiachi = calc_a_chi_a_chi_in_xp(p, d)?;
    let mul_denominator = div_xp(&one_xp(), &(achiachi - one_xp()))?;

    let invariant = mul_down_xp_to_np(&(at_a_chi + sqrt_term - &err), &mul_denominator);
    err = mul_up_xp_to_np(&err, &mul_denominator);
    let lambda_sq = (&p.lambda * &p.lambda) / BigInt::from(10).pow(36);
    err = err + (mul_up_xp_to_np(&invariant, &mul_denominator) * lambda_sq * 40) / one_xp() + 1;

    if &invariant + &err > max_invariant() {
        return Err(SorError::MaxInvariantExceeded);
    }
    Ok((invariant, err))
}

/// Invariant as the (over, under) estimate pair used by swaps.
pub fn invariant_vector(
    balances: &[U256; 2],
    p: &EclpParams,
    d: &DerivedEclpParams,
) -> Result<Vector2> {
    let (invariant, err) = calculate_invariant_with_error(balances, p, d)?;
    Ok(Vector2::new(&invariant + BigInt::from(2) * err, invariant))
}

fn calc_at_a_chi(x: &BigInt, y: &BigInt, p: &EclpParams, d: &DerivedEclpParams) -> Result<BigInt> {
    let d_sq2 = mul_xp(&d.d_sq, &d.d_sq);

    let term_xp = div_xp(
        &div_down_mag(&(div_down_mag(&d.w, &p.lambda)? + &d.z), &p.lambda)?,
        &d_sq2,
    )?;
    let mut val = mul_down_xp_to_np(&(mul_down_mag(x, &p.c) - mul_down_mag(y, &p.s)), &term_xp);

    let term_np = mul_down_mag(&mul_down_mag(x, &p.lambda), &p.s)
        + mul_down_mag(&mul_down_mag(y, &p.lambda), &p.c);
    val += mul_down_xp_to_np(&term_np, &div_xp(&d.u, &d_sq2)?);

    let term_np = mul_down_mag(x, &p.s) + mul_down_mag(y, &p.c);
    val += mul_down_xp_to_np(&term_np, &div_xp(&d.v, &d_sq2)?);

    Ok(val)
}

fn calc_a_chi_a_chi_in_xp(p: &EclpParams, d: &DerivedEclpParams) -> Result<BigInt> {
    let d_sq3 = d_sq_pow(d, 3);

    let mut val = mul_up_mag(
        &p.lambda,
        &div_xp(&mul_xp(&(BigInt::from(2) * &d.u), &d.v), &d_sq3)?,
    );

    let u1 = &d.u + 1;
    val += mul_up_mag(
        &mul_up_mag(&div_xp(&mul_xp(&u1, &u1), &d_sq3)?, &p.lambda),
        &p.lambda,
    );
    val += div_xp(&mul_xp(&d.v, &d.v), &d_sq3)?;

    let term_xp = div_up_mag(&d.w, &p.lambda)? + &d.z;
    val += div_xp(&mul_xp(&term_xp, &term_xp), &d_sq3)?;

    Ok(val)
}

fn calc_invariant_sqrt(
    x: &BigInt,
    y: &BigInt,
    p: &EclpParams,
    d: &DerivedEclpParams,
) -> Result<(BigInt, BigInt)> {
    let val = calc_min_atx_a_chiy_sq_plus_atx_sq(x, y, p, d)?
        + calc_2_atx_aty_a_chix_a_chiy(x, y, p, d)?
        + calc_min_aty_a_chix_sq_plus_aty_sq(x, y, p, d)?;

    let err = (mul_up_mag(x, x) + mul_up_mag(y, y)) / BigInt::from(10).pow(38);
    let val = if val.is_positive() {
        sqrt(&val)?
    } else {
        BigInt::zero()
    };
    Ok((val, err))
}

fn calc_min_atx_a_chiy_sq_plus_atx_sq(
    x: &BigInt,
    y: &BigInt,
    p: &EclpParams,
    d: &DerivedEclpParams,
) -> Result<BigInt> {
    let mut term_np = mul_up_mag(&mul_up_mag(&mul_up_mag(x, x), &p.c), &p.c)
        + mul_up_mag(&mul_up_mag(&mul_up_mag(y, y), &p.s), &p.s);
    term_np -= mul_down_mag(&mul_down_mag(&mul_down_mag(x, y), &(&p.c * 2)), &p.s);

    let mut term_xp = mul_xp(&d.u, &d.u)
        + div_down_mag(&mul_xp(&(&d.u * 2), &d.v), &p.lambda)?
        + div_down_mag(&div_down_mag(&mul_xp(&d.v, &d.v), &p.lambda)?, &p.lambda)?;
    term_xp = div_xp(&term_xp, &d_sq_pow(d, 4))?;

    let mut val = mul_down_xp_to_np(&-&term_np, &term_xp);
    val += mul_down_xp_to_np(
        &div_down_mag(&div_down_mag(&(term_np - 9), &p.lambda)?, &p.lambda)?,
        &div_xp(&one_xp(), &d.d_sq)?,
    );
    Ok(val)
}

fn calc_2_atx_aty_a_chix_a_chiy(
    x: &BigInt,
    y: &BigInt,
    p: &EclpParams,
    d: &DerivedEclpParams,
) -> Result<BigInt> {
    let mut term_np = mul_down_mag(
        &mul_down_mag(&(mul_down_mag(x, x) - mul_up_mag(y, y)), &(&p.c * 2)),
        &p.s,
    );
    let xy = mul_down_mag(y, &(x * 2));
    term_np += mul_down_mag(&mul_down_mag(&xy, &p.c), &p.c)
        - mul_down_mag(&mul_down_mag(&xy, &p.s), &p.s);

    let mut term_xp = mul_xp(&d.z, &d.u)
        + div_down_mag(&div_down_mag(&mul_xp(&d.w, &d.v), &p.lambda)?, &p.lambda)?;
    term_xp += div_down_mag(&(mul_xp(&d.w, &d.u) + mul_xp(&d.z, &d.v)), &p.lambda)?;
    term_xp = div_xp(&term_xp, &d_sq_pow(d, 4))?;

    Ok(mul_down_xp_to_np(&term_np, &term_xp))
}

fn calc_min_aty_a_chix_sq_plus_aty_sq(
    x: &BigInt,
    y: &BigInt,
    p: &EclpParams,
    d: &DerivedEclpParams,
) -> Result<BigInt> {
    let mut term_np = mul_up_mag(&mul_up_mag(&mul_up_mag(x, x), &p.s), &p.s)
        + mul_up_mag(&mul_up_mag(&mul_up_mag(y, y), &p.c), &p.c);
    term_np += mul_up_mag(&mul_up_mag(&mul_up_mag(x, y), &(&p.s * 2)), &p.c);

    let mut term_xp = mul_xp(&d.z, &d.z)
        + div_down_mag(&div_down_mag(&mul_xp(&d.w, &d.w), &p.lambda)?, &p.lambda)?;
    term_xp += div_down_mag(&mul_xp(&(&d.z * 2), &d.w), &p.lambda)?;
    term_xp = div_xp(&term_xp, &d_sq_pow(d, 4))?;

    let mut val = mul_down_xp_to_np(&-&term_np, &term_xp);
    val += mul_down_xp_to_np(&(term_np - 9), &div_xp(&one_xp(), &d.d_sq)?);
    Ok(val)
}

pub fn virtual_offset0(p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<BigInt> {
    let term_xp = div_xp(&d.tau_beta.x, &d.d_sq)?;
    let mut a = if d.tau_beta.x.is_positive() {
        mul_up_xp_to_np(&mul_up_mag(&mul_up_mag(&r.x, &p.lambda), &p.c), &term_xp)
    } else {
        mul_up_xp_to_np(&mul_down_mag(&mul_down_mag(&r.y, &p.lambda), &p.c), &term_xp)
    };
    a += mul_up_xp_to_np(&mul_up_mag(&r.x, &p.s), &div_xp(&d.tau_beta.y, &d.d_sq)?);
    Ok(a)
}

pub fn virtual_offset1(p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<BigInt> {
    let term_xp = div_xp(&d.tau_alpha.x, &d.d_sq)?;
    let mut b = if d.tau_alpha.x.is_negative() {
        mul_up_xp_to_np(&mul_up_mag(&mul_up_mag(&r.x, &p.lambda), &p.s), &-&term_xp)
    } else {
        mul_up_xp_to_np(&mul_down_mag(&mul_down_mag(&-&r.y, &p.lambda), &p.s), &term_xp)
    };
    b += mul_up_xp_to_np(&mul_up_mag(&r.x, &p.c), &div_xp(&d.tau_alpha.y, &d.d_sq)?);
    Ok(b)
}

fn max_balances0(p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<BigInt> {
    let term_xp1 = div_xp(&(&d.tau_beta.x - &d.tau_alpha.x), &d.d_sq)?;
    let term_xp2 = div_xp(&(&d.tau_beta.y - &d.tau_alpha.y), &d.d_sq)?;

    let mut xp = mul_down_xp_to_np(&mul_down_mag(&mul_down_mag(&r.y, &p.lambda), &p.c), &term_xp1);
    let side = if term_xp2.is_positive() {
        mul_down_mag(&r.y, &p.s)
    } else {
        mul_up_mag(&r.x, &p.s)
    };
    xp += mul_down_xp_to_np(&side, &term_xp2);
    Ok(xp)
}

fn max_balances1(p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<BigInt> {
    let term_xp1 = div_xp(&(&d.tau_beta.x - &d.tau_alpha.x), &d.d_sq)?;
    let term_xp2 = div_xp(&(&d.tau_alpha.y - &d.tau_beta.y), &d.d_sq)?;

    let mut yp = mul_down_xp_to_np(&mul_down_mag(&mul_down_mag(&r.y, &p.lambda), &p.s), &term_xp1);
    let side = if term_xp2.is_positive() {
        mul_down_mag(&r.y, &p.c)
    } else {
        mul_up_mag(&r.x, &p.c)
    };
    yp += mul_down_xp_to_np(&side, &term_xp2);
    Ok(yp)
}

/// Upper bound on each token balance for the current invariant.
pub fn max_balances(p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<[BigInt; 2]> {
    Ok([max_balances0(p, d, r)?, max_balances1(p, d, r)?])
}

fn check_asset_bounds(
    p: &EclpParams,
    d: &DerivedEclpParams,
    r: &Vector2,
    new_balance: &BigInt,
    asset_index: usize,
) -> Result<()> {
    let bound = if asset_index == 0 {
        max_balances0(p, d, r)?
    } else {
        max_balances1(p, d, r)?
    };
    if new_balance > &bound {
        return Err(SorError::AssetBoundsExceeded);
    }
    Ok(())
}

fn calc_xp_xp_div_lambda_lambda(
    x: &BigInt,
    r: &Vector2,
    lambda: &BigInt,
    s: &BigInt,
    c: &BigInt,
    tau_beta: &Vector2,
    d_sq: &BigInt,
) -> Result<BigInt> {
    let d_sq2 = mul_xp(d_sq, d_sq);

    let term_xp = div_xp(&mul_xp(&tau_beta.x, &tau_beta.y), &d_sq2)?;
    let mut qa = if term_xp.is_positive() {
        let a = mul_up_mag(&mul_up_mag(&r.x, &r.x), &(s * 2));
        mul_up_xp_to_np(&mul_up_mag(&a, c), &(term_xp + 7))
    } else {
        let a = mul_down_mag(&mul_down_mag(&r.y, &r.y), &(s * 2));
        mul_up_xp_to_np(&mul_down_mag(&a, c), &term_xp)
    };

    let qb = if tau_beta.x.is_negative() {
        mul_up_xp_to_np(
            &mul_up_mag(&mul_up_mag(&r.x, x), &(c * 2)),
            &(-div_xp(&tau_beta.x, d_sq)? + 3),
        )
    } else {
        mul_up_xp_to_np(
            &mul_down_mag(&mul_down_mag(&-&r.y, x), &(c * 2)),
            &div_xp(&tau_beta.x, d_sq)?,
        )
    };
    qa += qb;

    let term_xp = div_xp(&mul_xp(&tau_beta.y, &tau_beta.y), &d_sq2)? + 7;
    let qb = mul_up_xp_to_np(&mul_up_mag(&mul_up_mag(&mul_up_mag(&r.x, &r.x), s), s), &term_xp);
    let qc = mul_up_xp_to_np(
        &mul_down_mag(&mul_down_mag(&-&r.y, x), &(s * 2)),
        &div_xp(&tau_beta.y, d_sq)?,
    );

    let qb = qb + qc + mul_up_mag(x, x);
    let qb = if qb.is_positive() {
        div_up_mag(&qb, lambda)?
    } else {
        div_down_mag(&qb, lambda)?
    };

    qa += qb;
    let qa = if qa.is_positive() {
        div_up_mag(&qa, lambda)?
    } else {
        div_down_mag(&qa, lambda)?
    };

    let term_xp = div_xp(&mul_xp(&tau_beta.x, &tau_beta.x), &d_sq2)? + 7;
    let val = mul_up_mag(&mul_up_mag(&mul_up_mag(&r.x, &r.x), c), c);
    Ok(mul_up_xp_to_np(&val, &term_xp) + qa)
}

#[allow(clippy::too_many_arguments)]
fn solve_quadratic_swap(
    lambda: &BigInt,
    x: &BigInt,
    s: &BigInt,
    c: &BigInt,
    r: &Vector2,
    ab: &Vector2,
    tau_beta: &Vector2,
    d_sq: &BigInt,
) -> Result<BigInt> {
    let lam_bar = Vector2::new(
        one_xp() - div_down_mag(&div_down_mag(&one_xp(), lambda)?, lambda)?,
        one_xp() - div_up_mag(&div_up_mag(&one_xp(), lambda)?, lambda)?,
    );

    let xp = x - &ab.x;
    let qb = if xp.is_positive() {
        mul_up_xp_to_np(
            &mul_down_mag(&mul_down_mag(&-&xp, s), c),
            &div_xp(&lam_bar.y, d_sq)?,
        )
    } else {
        mul_up_xp_to_np(
            &mul_up_mag(&mul_up_mag(&-&xp, s), c),
            &(div_xp(&lam_bar.x, d_sq)? + 1),
        )
    };

    let s_term = Vector2::new(
        one_xp() - div_xp(&mul_down_mag(&mul_down_mag(&lam_bar.y, s), s), d_sq)?,
        one_xp() - (div_xp(&mul_up_mag(&mul_up_mag(&lam_bar.x, s), s), &(d_sq + 1))? + 1),
    );

    let mut qc = -calc_xp_xp_div_lambda_lambda(x, r, lambda, s, c, tau_beta, d_sq)?;
    qc += mul_down_xp_to_np(&mul_down_mag(&r.y, &r.y), &s_term.y);
    let qc = if qc.is_positive() {
        sqrt(&qc)?
    } else {
        BigInt::zero()
    };

    let diff = &qb - &qc;
    let qa = if diff.is_positive() {
        mul_up_xp_to_np(&diff, &(div_xp(&one_xp(), &s_term.y)? + 1))
    } else {
        mul_up_xp_to_np(&diff, &div_xp(&one_xp(), &s_term.x)?)
    };
    Ok(qa + &ab.y)
}

fn calc_y_given_x(x: &BigInt, p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<BigInt> {
    let ab = Vector2::new(virtual_offset0(p, d, r)?, virtual_offset1(p, d, r)?);
    solve_quadratic_swap(&p.lambda, x, &p.s, &p.c, r, &ab, &d.tau_beta, &d.d_sq)
}

fn calc_x_given_y(y: &BigInt, p: &EclpParams, d: &DerivedEclpParams, r: &Vector2) -> Result<BigInt> {
    let ba = Vector2::new(virtual_offset1(p, d, r)?, virtual_offset0(p, d, r)?);
    let tau_alpha_flipped = Vector2::new(-&d.tau_alpha.x, d.tau_alpha.y.clone());
    solve_quadratic_swap(&p.lambda, y, &p.c, &p.s, r, &ba, &tau_alpha_flipped, &d.d_sq)
}

pub fn calc_out_given_in(
    balances: &[U256; 2],
    amount_in: U256,
    token_in_is_token0: bool,
    p: &EclpParams,
    d: &DerivedEclpParams,
    r: &Vector2,
) -> Result<U256> {
    let (ix_in, ix_out) = if token_in_is_token0 { (0, 1) } else { (1, 0) };

    let bal_in_new = to_bigint(balances[ix_in]) + to_bigint(amount_in);
    check_asset_bounds(p, d, r, &bal_in_new, ix_in)?;

    let bal_out_new = if token_in_is_token0 {
        calc_y_given_x(&bal_in_new, p, d, r)?
    } else {
        calc_x_given_y(&bal_in_new, p, d, r)?
    };

    let amount_out = to_bigint(balances[ix_out]) - bal_out_new;
    if amount_out.is_negative() {
        return Err(SorError::AssetBoundsExceeded);
    }
    to_u256(&amount_out)
}

pub fn calc_in_given_out(
    balances: &[U256; 2],
    amount_out: U256,
    token_in_is_token0: bool,
    p: &EclpParams,
    d: &DerivedEclpParams,
    r: &Vector2,
) -> Result<U256> {
    let (ix_in, ix_out) = if token_in_is_token0 { (0, 1) } else { (1, 0) };

    if amount_out > balances[ix_out] {
        return Err(SorError::AssetBoundsExceeded);
    }
    let bal_out_new = to_bigint(balances[ix_out] - amount_out);

    let bal_in_new = if token_in_is_token0 {
        calc_x_given_y(&bal_out_new, p, d, r)?
    } else {
        calc_y_given_x(&bal_out_new, p, d, r)?
    };
    check_asset_bounds(p, d, r, &bal_in_new, ix_in)?;

    let amount_in = bal_in_new - to_bigint(balances[ix_in]);
    if amount_in.is_negative() {
        return Err(SorError::AssetBoundsExceeded);
    }
    to_u256(&amount_in)
}
