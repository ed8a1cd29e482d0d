//! Vault simulation
//!
//! Pools expose curve math on live scale18 balances. This module wraps it the
//! way each vault generation settles a trade: decimal scaling, token rates, the
//! swap fee (static or hook computed), minimum trade amounts and rounding. V3
//! pools additionally trade their own BPT through single-token add/remove.

use primitive_types::U256;
use sor_core::{ProtocolVersion, SwapKind};

use crate::error::{Result, SorError};
use crate::fixed_point::{
    self, complement, div_down, div_up, mul_div_up, mul_down, mul_up, ONE,
};
use crate::math::base_pool::{self, InvariantMath};
use crate::pools::{BasePool, Pool, PoolCommon, TokenSlot};
use crate::token::Token;

/// Smallest non-zero scale18 amount the V3 vault settles
pub const MINIMUM_TRADE_AMOUNT: U256 = U256([1_000_000, 0, 0, 0]);

/// Simulate a hop. `amount` is the raw amount on the fixed side; the result is
/// the raw amount on the other side.
pub(crate) fn swap(
    pool: &Pool,
    kind: SwapKind,
    token_in: &Token,
    token_out: &Token,
    amount: U256,
) -> Result<U256> {
    let curve = match pool {
        Pool::Buffer(buffer) => return buffer.swap(kind, token_in, token_out, amount),
        _ => pool.curve().ok_or_else(|| SorError::InvalidPoolData {
            pool_id: pool.id().to_string(),
            reason: "pool has no curve".into(),
        })?,
    };
    let common = pool.common();
    let slots = common.pair_slots(token_in, token_out)?;
    if amount.is_zero() {
        return Ok(U256::zero());
    }

    match slots {
        (TokenSlot::Index(i), TokenSlot::Index(o)) => match common.protocol_version {
            ProtocolVersion::V2 => swap_v2(curve, common, kind, i, o, amount),
            ProtocolVersion::V3 => swap_v3(curve, common, kind, i, o, amount),
        },
        (TokenSlot::Index(i), TokenSlot::Bpt) => add_liquidity_hop(curve, common, kind, i, amount),
        (TokenSlot::Bpt, TokenSlot::Index(o)) => {
            remove_liquidity_hop(curve, common, kind, o, amount)
        }
        (TokenSlot::Bpt, TokenSlot::Bpt) => Err(SorError::TokensNotInPool {
            pool_id: common.id.clone(),
        }),
    }
}

// ----- Scaling helpers -----

fn to_scaled18_round_down(raw: U256, scaling_factor: U256, rate: U256) -> Result<U256> {
    mul_down(fixed_point::mul(raw, scaling_factor)?, rate)
}

fn to_scaled18_round_up(raw: U256, scaling_factor: U256, rate: U256) -> Result<U256> {
    mul_up(fixed_point::mul(raw, scaling_factor)?, rate)
}

fn to_raw_round_down(scaled18: U256, scaling_factor: U256, rate: U256) -> Result<U256> {
    div_down(scaled18, fixed_point::mul(scaling_factor, rate)?)
}

fn to_raw_round_up(scaled18: U256, scaling_factor: U256, rate: U256) -> Result<U256> {
    div_up(scaled18, fixed_point::mul(scaling_factor, rate)?)
}

/// Rates with a fractional last digit are bumped by one unit when rounding up.
fn compute_rate_round_up(rate: U256) -> U256 {
    if (rate / ONE) * ONE == rate {
        rate
    } else {
        rate + 1
    }
}

fn ensure_valid_trade_amount(amount: U256) -> Result<()> {
    if !amount.is_zero() && amount < MINIMUM_TRADE_AMOUNT {
        return Err(SorError::TradeAmountTooSmall);
    }
    Ok(())
}

// ----- V2 -----

/// Fees are taken on the raw amount: off the input before the curve (GivenIn),
/// grossed up on the input after it (GivenOut).
fn swap_v2(
    curve: &dyn BasePool,
    common: &PoolCommon,
    kind: SwapKind,
    index_in: usize,
    index_out: usize,
    amount: U256,
) -> Result<U256> {
    let token_in = &common.tokens[index_in];
    let token_out = &common.tokens[index_out];
    let balances = common.live_balances()?;

    match kind {
        SwapKind::GivenIn => {
            let fee = mul_up(amount, common.swap_fee)?;
            let amount_in = fixed_point::sub(amount, fee)?;
            let given = to_scaled18_round_down(amount_in, token_in.scaling_factor()?, token_in.rate)?;
            let out = curve.on_swap(kind, &balances, index_in, index_out, given)?;
            to_raw_round_down(out, token_out.scaling_factor()?, token_out.rate)
        }
        SwapKind::GivenOut => {
            // V2 upscales with mulDown in both directions
            let given = to_scaled18_round_down(amount, token_out.scaling_factor()?, token_out.rate)?;
            let amount_in = curve.on_swap(kind, &balances, index_in, index_out, given)?;
            let raw_in = to_raw_round_up(amount_in, token_in.scaling_factor()?, token_in.rate)?;
            div_up(raw_in, complement(common.swap_fee))
        }
    }
}

// ----- V3 -----

fn swap_v3(
    curve: &dyn BasePool,
    common: &PoolCommon,
    kind: SwapKind,
    index_in: usize,
    index_out: usize,
    amount: U256,
) -> Result<U256> {
    let token_in = &common.tokens[index_in];
    let token_out = &common.tokens[index_out];
    let balances = common.live_balances()?;

    let given = match kind {
        SwapKind::GivenIn => {
            to_scaled18_round_down(amount, token_in.scaling_factor()?, token_in.rate)?
        }
        SwapKind::GivenOut => to_scaled18_round_up(
            amount,
            token_out.scaling_factor()?,
            compute_rate_round_up(token_out.rate),
        )?,
    };

    let fee = match &common.hook {
        Some(hook) => hook.dynamic_swap_fee(
            kind,
            given,
            &balances,
            index_in,
            index_out,
            common.swap_fee,
        )?,
        None => common.swap_fee,
    };

    ensure_valid_trade_amount(given)?;
    match kind {
        SwapKind::GivenIn => {
            let given = fixed_point::sub(given, mul_up(given, fee)?)?;
            let out = curve.on_swap(kind, &balances, index_in, index_out, given)?;
            ensure_valid_trade_amount(out)?;
            to_raw_round_down(
                out,
                token_out.scaling_factor()?,
                compute_rate_round_up(token_out.rate),
            )
        }
        SwapKind::GivenOut => {
            let amount_in = curve.on_swap(kind, &balances, index_in, index_out, given)?;
            ensure_valid_trade_amount(amount_in)?;
            let amount_in =
                fixed_point::add(amount_in, mul_div_up(amount_in, fee, complement(fee))?)?;
            to_raw_round_up(amount_in, token_in.scaling_factor()?, token_in.rate)
        }
    }
}

// ----- BPT hops -----

/// Curve math usable for single-token liquidity, `None` when the pool forbids it.
fn liquidity_math<'a>(curve: &'a dyn BasePool, common: &PoolCommon) -> Option<&'a dyn InvariantMath> {
    if common.liquidity_management.disable_unbalanced_liquidity {
        return None;
    }
    curve.invariant_math()
}

/// Token in, BPT out
fn add_liquidity_hop(
    curve: &dyn BasePool,
    common: &PoolCommon,
    kind: SwapKind,
    index: usize,
    amount: U256,
) -> Result<U256> {
    let math = match liquidity_math(curve, common) {
        Some(math) => math,
        None => return Ok(U256::zero()),
    };
    let token = &common.tokens[index];
    let balances = common.live_balances()?;

    match kind {
        SwapKind::GivenIn => {
            let mut amounts = vec![U256::zero(); balances.len()];
            amounts[index] = to_scaled18_round_down(amount, token.scaling_factor()?, token.rate)?;
            base_pool::add_liquidity_unbalanced(
                math,
                &balances,
                &amounts,
                common.total_shares,
                common.swap_fee,
            )
        }
        SwapKind::GivenOut => {
            let amount_in = base_pool::add_liquidity_single_token_exact_out(
                math,
                &balances,
                index,
                amount,
                common.total_shares,
                common.swap_fee,
            )?;
            to_raw_round_up(
                amount_in,
                token.scaling_factor()?,
                compute_rate_round_up(token.rate),
            )
        }
    }
}

/// BPT in, token out. An exit fee hook taxes the withdrawal.
fn remove_liquidity_hop(
    curve: &dyn BasePool,
    common: &PoolCommon,
    kind: SwapKind,
    index: usize,
    amount: U256,
) -> Result<U256> {
    let math = match liquidity_math(curve, common) {
        Some(math) => math,
        None => return Ok(U256::zero()),
    };
    let token = &common.tokens[index];
    let balances = common.live_balances()?;
    let exit_fee = common.hook.as_ref().and_then(|hook| hook.exit_fee());

    match kind {
        SwapKind::GivenIn => {
            let out = base_pool::remove_liquidity_single_token_exact_in(
                math,
                &balances,
                index,
                amount,
                common.total_shares,
                common.swap_fee,
            )?;
            let raw = to_raw_round_down(
                out,
                token.scaling_factor()?,
                compute_rate_round_up(token.rate),
            )?;
            match exit_fee {
                Some(fee) => fixed_point::sub(raw, mul_down(raw, fee)?),
                None => Ok(raw),
            }
        }
        SwapKind::GivenOut => {
            let out = to_scaled18_round_up(
                amount,
                token.scaling_factor()?,
                compute_rate_round_up(token.rate),
            )?;
            let bpt_in = base_pool::remove_liquidity_single_token_exact_out(
                math,
                &balances,
                index,
                out,
                common.total_shares,
                common.swap_fee,
            )?;
            match exit_fee {
                Some(fee) => div_up(bpt_in, complement(fee)),
                None => Ok(bpt_in),
            }
        }
    }
}
