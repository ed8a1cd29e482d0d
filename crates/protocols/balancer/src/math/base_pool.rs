//! Single-token liquidity math shared by every invariant-based pool
//!
//! Adding or removing liquidity through a single token is priced as the
//! equivalent proportional operation plus an implied swap, and only the swap part
//! is charged the pool fee.

use primitive_types::U256;

use crate::error::{Result, SorError};
use crate::fixed_point::{
    add, complement, div, div_down, div_up, mul, mul_div_up, mul_down, mul_up, sub, Rounding,
};

/// What a pool must expose for the vault to price liquidity operations.
pub trait InvariantMath {
    fn compute_invariant(&self, balances: &[U256], rounding: Rounding) -> Result<U256>;

    /// New balance of `token_index` once the invariant is scaled by `invariant_ratio`.
    fn compute_balance(
        &self,
        balances: &[U256],
        token_index: usize,
        invariant_ratio: U256,
    ) -> Result<U256>;

    fn min_invariant_ratio(&self) -> U256;

    fn max_invariant_ratio(&self) -> U256;
}

fn ensure_below_max(pool: &(impl InvariantMath + ?Sized), ratio: U256) -> Result<()> {
    if ratio > pool.max_invariant_ratio() {
        return Err(SorError::InvariantRatioOutOfBounds);
    }
    Ok(())
}

fn ensure_above_min(pool: &(impl InvariantMath + ?Sized), ratio: U256) -> Result<()> {
    if ratio < pool.min_invariant_ratio() {
        return Err(SorError::InvariantRatioOutOfBounds);
    }
    Ok(())
}

/// BPT minted for an unbalanced deposit of `exact_amounts`.
pub fn add_liquidity_unbalanced(
    pool: &(impl InvariantMath + ?Sized),
    current_balances: &[U256],
    exact_amounts: &[U256],
    total_supply: U256,
    swap_fee: U256,
) -> Result<U256> {
    let mut new_balances = current_balances
        .iter()
        .zip(exact_amounts)
        .map(|(balance, amount)| add(*balance, *amount))
        .collect::<Result<Vec<_>>>()?;

    let current_invariant = pool.compute_invariant(current_balances, Rounding::Up)?;
    let new_invariant = pool.compute_invariant(&new_balances, Rounding::Down)?;
    let invariant_ratio = div_down(new_invariant, current_invariant)?;
    ensure_below_max(pool, invariant_ratio)?;

    for (i, balance) in current_balances.iter().enumerate() {
        let proportional = mul_down(invariant_ratio, *balance)?;
        if new_balances[i] > proportional {
            let taxable = new_balances[i] - proportional;
            new_balances[i] = sub(new_balances[i], mul_up(taxable, swap_fee)?)?;
        }
    }

    let invariant_with_fees = pool.compute_invariant(&new_balances, Rounding::Down)?;
    if invariant_with_fees <= current_invariant {
        return Ok(U256::zero());
    }
    div(
        mul(total_supply, invariant_with_fees - current_invariant)?,
        current_invariant,
    )
}

/// Tokens required to mint exactly `exact_bpt_out` through one token.
pub fn add_liquidity_single_token_exact_out(
    pool: &(impl InvariantMath + ?Sized),
    current_balances: &[U256],
    token_in_index: usize,
    exact_bpt_out: U256,
    total_supply: U256,
    swap_fee: U256,
) -> Result<U256> {
    let new_supply = add(exact_bpt_out, total_supply)?;
    let invariant_ratio = div_up(new_supply, total_supply)?;
    ensure_below_max(pool, invariant_ratio)?;

    let new_balance = pool.compute_balance(current_balances, token_in_index, invariant_ratio)?;
    let amount_in = sub(new_balance, current_balances[token_in_index])?;

    let non_taxable = mul_div_up(new_supply, current_balances[token_in_index], total_supply)?;
    let taxable = new_balance.saturating_sub(non_taxable);
    let fee = sub(div_up(taxable, complement(swap_fee))?, taxable)?;

    add(amount_in, fee)
}

/// Tokens paid out for burning exactly `exact_bpt_in` through one token.
pub fn remove_liquidity_single_token_exact_in(
    pool: &(impl InvariantMath + ?Sized),
    current_balances: &[U256],
    token_out_index: usize,
    exact_bpt_in: U256,
    total_supply: U256,
    swap_fee: U256,
) -> Result<U256> {
    let new_supply = sub(total_supply, exact_bpt_in)?;
    let invariant_ratio = div_up(new_supply, total_supply)?;
    ensure_above_min(pool, invariant_ratio)?;

    let new_balance = pool.compute_balance(current_balances, token_out_index, invariant_ratio)?;
    let amount_out = sub(current_balances[token_out_index], new_balance)?;

    let balance_before_tax = mul_div_up(new_supply, current_balances[token_out_index], total_supply)?;
    let taxable = balance_before_tax.saturating_sub(new_balance);
    let fee = mul_up(taxable, swap_fee)?;

    sub(amount_out, fee)
}

/// BPT burned to withdraw exactly `exact_amount_out` of one token.
pub fn remove_liquidity_single_token_exact_out(
    pool: &(impl InvariantMath + ?Sized),
    current_balances: &[U256],
    token_out_index: usize,
    exact_amount_out: U256,
    total_supply: U256,
    swap_fee: U256,
) -> Result<U256> {
    let mut new_balances = current_balances.to_vec();
    new_balances[token_out_index] = sub(new_balances[token_out_index], exact_amount_out)?;

    let current_invariant = pool.compute_invariant(current_balances, Rounding::Up)?;
    let invariant_ratio = div_up(
        pool.compute_invariant(&new_balances, Rounding::Up)?,
        current_invariant,
    )?;
    ensure_above_min(pool, invariant_ratio)?;

    let taxable = mul_up(invariant_ratio, current_balances[token_out_index])?
        .saturating_sub(new_balances[token_out_index]);
    let fee = sub(div_up(taxable, complement(swap_fee))?, taxable)?;
    new_balances[token_out_index] = sub(new_balances[token_out_index], fee)?;

    let invariant_with_fees = pool.compute_invariant(&new_balances, Rounding::Down)?;
    mul_div_up(
        total_supply,
        sub(current_invariant, invariant_with_fees)?,
        current_invariant,
    )
}
