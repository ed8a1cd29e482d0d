//! Pool variants
//!
//! A closed set of pool types. Each curve pool implements [`BasePool`] for its
//! invariant math on live scale18 balances; the vault layer in `crate::vault`
//! handles decimals, rates, fees, hooks and BPT hops on top of that. Buffers are
//! rate conversions and bypass curve math entirely.

pub mod buffer;
pub mod gyro2;
pub mod gyro_e;
pub mod stable;
pub mod weighted;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sor_core::{Address, Chain, HookType, ProtocolVersion, SwapKind};
use tracing::warn;

use crate::error::{Result, SorError};
use crate::fixed_point::{self, format_units};
use crate::hooks::HookState;
use crate::math::base_pool::InvariantMath;
use crate::token::{Token, TokenAmount};
use crate::vault;

pub use buffer::BufferPool;
pub use gyro2::Gyro2Pool;
pub use gyro_e::GyroEPool;
pub use stable::StablePool;
pub use weighted::WeightedPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolType {
    Weighted,
    Stable,
    Gyro2,
    #[serde(rename = "GYROE")]
    GyroE,
    Buffer,
}

/// Per-pool switches restricting which liquidity operations are valid
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityManagement {
    #[serde(default)]
    pub disable_unbalanced_liquidity: bool,
    #[serde(default)]
    pub enable_add_liquidity_custom: bool,
    #[serde(default)]
    pub enable_donation: bool,
    #[serde(default)]
    pub enable_remove_liquidity_custom: bool,
}

/// A token held by a pool. Balances only move through `increase`/`decrease`
/// during simulation.
#[derive(Debug, Clone)]
pub struct PoolToken {
    pub token: Token,
    pub index: usize,
    pub balance: TokenAmount,
    /// Price rate, `ONE` when the token has no rate provider
    pub rate: U256,
}

impl PoolToken {
    pub fn new(token: Token, index: usize, raw_balance: U256, rate: U256) -> Result<Self> {
        let balance = TokenAmount::from_raw(token.clone(), raw_balance)?;
        Ok(Self {
            token,
            index,
            balance,
            rate,
        })
    }

    pub fn increase(&mut self, raw: U256) -> Result<()> {
        self.balance = TokenAmount::from_raw(
            self.token.clone(),
            fixed_point::add(self.balance.amount, raw)?,
        )?;
        Ok(())
    }

    pub fn decrease(&mut self, raw: U256) -> Result<()> {
        self.balance = TokenAmount::from_raw(
            self.token.clone(),
            fixed_point::sub(self.balance.amount, raw)?,
        )?;
        Ok(())
    }

    pub fn scaling_factor(&self) -> Result<U256> {
        fixed_point::scaling_factor(self.token.decimals)
    }

    /// `balance * rate` in scale18, rounded down
    pub fn live_balance(&self) -> Result<U256> {
        fixed_point::mul_down(self.balance.scale18, self.rate)
    }
}

/// Fields shared by every pool variant
#[derive(Debug, Clone)]
pub struct PoolCommon {
    pub id: String,
    pub address: Address,
    pub chain: Chain,
    pub protocol_version: ProtocolVersion,
    pub swap_fee: U256,
    /// Sorted by index
    pub tokens: Vec<PoolToken>,
    /// BPT supply, scale18
    pub total_shares: U256,
    pub hook: Option<HookState>,
    pub liquidity_management: LiquidityManagement,
}

/// Where a token sits relative to a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot {
    Index(usize),
    /// The pool's own share token
    Bpt,
}

impl PoolCommon {
    pub fn bpt(&self) -> Token {
        Token::new(self.chain, self.address.clone(), sor_core::constants::BPT_DECIMALS)
    }

    /// BPT is only tradable through the V3 vault.
    pub fn has_bpt_token(&self) -> bool {
        self.protocol_version == ProtocolVersion::V3
    }

    pub fn index_of(&self, token: &Token) -> Option<usize> {
        self.tokens.iter().position(|t| t.token == *token)
    }

    pub fn slot_of(&self, token: &Token) -> Option<TokenSlot> {
        if let Some(index) = self.index_of(token) {
            return Some(TokenSlot::Index(index));
        }
        if self.has_bpt_token() && token.is_same_address(&self.address) && token.chain == self.chain {
            return Some(TokenSlot::Bpt);
        }
        None
    }

    pub fn pair_slots(&self, token_in: &Token, token_out: &Token) -> Result<(TokenSlot, TokenSlot)> {
        let not_in_pool = || SorError::TokensNotInPool {
            pool_id: self.id.clone(),
        };
        let slot_in = self.slot_of(token_in).ok_or_else(not_in_pool)?;
        let slot_out = self.slot_of(token_out).ok_or_else(not_in_pool)?;
        if slot_in == slot_out {
            return Err(not_in_pool());
        }
        Ok((slot_in, slot_out))
    }

    pub fn pair_indices(&self, token_in: &Token, token_out: &Token) -> Result<(usize, usize)> {
        match self.pair_slots(token_in, token_out)? {
            (TokenSlot::Index(i), TokenSlot::Index(o)) => Ok((i, o)),
            _ => Err(SorError::TokensNotInPool {
                pool_id: self.id.clone(),
            }),
        }
    }

    pub fn live_balances(&self) -> Result<Vec<U256>> {
        self.tokens.iter().map(PoolToken::live_balance).collect()
    }
}

/// Curve math contract every invariant-based pool implements
pub trait BasePool {
    /// Solve the curve on live scale18 balances. For `GivenIn` the amount is the
    /// fee-free input and the result the output; `GivenOut` the reverse.
    fn on_swap(
        &self,
        kind: SwapKind,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
        amount: U256,
    ) -> Result<U256>;

    /// Largest raw amount the pool accepts on the given side of a swap.
    fn limit_amount_swap(&self, index_in: usize, index_out: usize, kind: SwapKind) -> Result<U256>;

    /// Ranking heuristic in scale18. Not used for exact math.
    fn normalized_liquidity(&self, index_in: usize, index_out: usize) -> Result<U256>;

    /// Invariant hooks for single-token liquidity, `None` when the pool does not
    /// support unbalanced liquidity.
    fn invariant_math(&self) -> Option<&dyn InvariantMath>;

    /// Amplification including precision, stable-family pools only.
    fn amp(&self) -> Option<U256> {
        None
    }
}

/// Snapshot of a pool's simulation inputs, for inspection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    pub pool_id: String,
    pub pool_type: PoolType,
    pub protocol_version: ProtocolVersion,
    pub tokens: Vec<Address>,
    pub balances_live_scale18: Vec<String>,
    pub token_rates: Vec<String>,
    pub swap_fee: String,
    pub total_supply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<HookType>,
    pub liquidity_management: LiquidityManagement,
}

#[derive(Debug, Clone)]
pub enum Pool {
    Weighted(WeightedPool),
    Stable(StablePool),
    Gyro2(Gyro2Pool),
    GyroE(GyroEPool),
    Buffer(BufferPool),
}

impl Pool {
    pub fn common(&self) -> &PoolCommon {
        match self {
            Self::Weighted(p) => &p.common,
            Self::Stable(p) => &p.common,
            Self::Gyro2(p) => &p.common,
            Self::GyroE(p) => &p.common,
            Self::Buffer(p) => &p.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut PoolCommon {
        match self {
            Self::Weighted(p) => &mut p.common,
            Self::Stable(p) => &mut p.common,
            Self::Gyro2(p) => &mut p.common,
            Self::GyroE(p) => &mut p.common,
            Self::Buffer(p) => &mut p.common,
        }
    }

    /// Curve math, `None` for buffers
    pub fn curve(&self) -> Option<&dyn BasePool> {
        match self {
            Self::Weighted(p) => Some(p),
            Self::Stable(p) => Some(p),
            Self::Gyro2(p) => Some(p),
            Self::GyroE(p) => Some(p),
            Self::Buffer(_) => None,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn pool_type(&self) -> PoolType {
        match self {
            Self::Weighted(_) => PoolType::Weighted,
            Self::Stable(_) => PoolType::Stable,
            Self::Gyro2(_) => PoolType::Gyro2,
            Self::GyroE(_) => PoolType::GyroE,
            Self::Buffer(_) => PoolType::Buffer,
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.common().protocol_version
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, Self::Buffer(_))
    }

    /// Every token a path may enter or leave this pool with, BPT included for V3.
    pub fn tradable_tokens(&self) -> Vec<Token> {
        let common = self.common();
        let mut tokens: Vec<Token> = common.tokens.iter().map(|t| t.token.clone()).collect();
        if !self.is_buffer() && common.has_bpt_token() {
            tokens.push(common.bpt());
        }
        tokens
    }

    pub fn swap_given_in(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: &TokenAmount,
    ) -> Result<TokenAmount> {
        self.ensure_token(token_in, &amount_in.token)?;
        let limit = self.get_limit_amount_swap(token_in, token_out, SwapKind::GivenIn)?;
        if amount_in.amount > limit {
            return Err(SorError::SwapLimitExceeded);
        }
        let out = vault::swap(self, SwapKind::GivenIn, token_in, token_out, amount_in.amount)?;
        TokenAmount::from_raw(token_out.clone(), out)
    }

    pub fn swap_given_out(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_out: &TokenAmount,
    ) -> Result<TokenAmount> {
        self.ensure_token(token_out, &amount_out.token)?;
        let limit = self.get_limit_amount_swap(token_in, token_out, SwapKind::GivenOut)?;
        if amount_out.amount > limit {
            return Err(SorError::SwapLimitExceeded);
        }
        let amount_in = vault::swap(self, SwapKind::GivenOut, token_in, token_out, amount_out.amount)?;
        TokenAmount::from_raw(token_in.clone(), amount_in)
    }

    /// Largest raw amount on the given side. BPT hops and buffers are bounded by
    /// their own math rather than a fixed ratio.
    pub fn get_limit_amount_swap(
        &self,
        token_in: &Token,
        token_out: &Token,
        kind: SwapKind,
    ) -> Result<U256> {
        let common = self.common();
        match (self.curve(), common.pair_slots(token_in, token_out)?) {
            (Some(curve), (TokenSlot::Index(i), TokenSlot::Index(o))) => {
                curve.limit_amount_swap(i, o, kind)
            }
            _ => Ok(U256::MAX),
        }
    }

    pub fn get_normalized_liquidity(&self, token_in: &Token, token_out: &Token) -> Result<U256> {
        let common = self.common();
        let curve = match self.curve() {
            Some(curve) => curve,
            None => return Ok(U256::MAX),
        };
        match common.pair_slots(token_in, token_out)? {
            (TokenSlot::Index(i), TokenSlot::Index(o)) => curve.normalized_liquidity(i, o),
            (TokenSlot::Index(i), TokenSlot::Bpt) | (TokenSlot::Bpt, TokenSlot::Index(i)) => {
                Ok(common.tokens[i].live_balance()? / 2)
            }
            (TokenSlot::Bpt, TokenSlot::Bpt) => Err(SorError::TokensNotInPool {
                pool_id: common.id.clone(),
            }),
        }
    }

    /// Record a simulated trade in this pool's balance mirror.
    pub fn apply_swap(
        &mut self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        amount_out: U256,
    ) -> Result<()> {
        if self.is_buffer() {
            return Ok(());
        }
        let common = self.common_mut();
        match common.pair_slots(token_in, token_out)? {
            (TokenSlot::Index(i), TokenSlot::Index(o)) => {
                common.tokens[i].increase(amount_in)?;
                common.tokens[o].decrease(amount_out)?;
            }
            (TokenSlot::Index(i), TokenSlot::Bpt) => {
                common.tokens[i].increase(amount_in)?;
                common.total_shares = fixed_point::add(common.total_shares, amount_out)?;
            }
            (TokenSlot::Bpt, TokenSlot::Index(o)) => {
                common.total_shares = fixed_point::sub(common.total_shares, amount_in)?;
                common.tokens[o].decrease(amount_out)?;
            }
            (TokenSlot::Bpt, TokenSlot::Bpt) => {
                return Err(SorError::TokensNotInPool {
                    pool_id: common.id.clone(),
                })
            }
        }
        Ok(())
    }

    /// Inspection snapshot. `hook_name` overrides the recorded hook type.
    pub fn get_pool_state(&self, hook_name: Option<&str>) -> Result<PoolState> {
        let common = self.common();
        let hook_type = match hook_name {
            Some(name) => {
                let resolved = HookType::from_name(name);
                if resolved.is_none() {
                    warn!(pool_id = %common.id, hook = name, "Unknown hook name, reporting pool without hook");
                }
                resolved
            }
            None => common.hook.as_ref().map(HookState::hook_type),
        };

        let balances = common
            .live_balances()?
            .into_iter()
            .map(|b| format_units(b, 18))
            .collect();

        Ok(PoolState {
            pool_id: common.id.clone(),
            pool_type: self.pool_type(),
            protocol_version: common.protocol_version,
            tokens: common.tokens.iter().map(|t| t.token.address.clone()).collect(),
            balances_live_scale18: balances,
            token_rates: common.tokens.iter().map(|t| format_units(t.rate, 18)).collect(),
            swap_fee: format_units(common.swap_fee, 18),
            total_supply: format_units(common.total_shares, 18),
            amp: self
                .curve()
                .and_then(|c| c.amp())
                .map(|a| (a / crate::math::stable::AMP_PRECISION).to_string()),
            hook_type,
            liquidity_management: common.liquidity_management.clone(),
        })
    }

    fn ensure_token(&self, expected: &Token, actual: &Token) -> Result<()> {
        if expected != actual {
            return Err(SorError::TokenMismatch {
                expected: expected.address.to_string(),
                actual: actual.address.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{stable_pool, weighted_pool, with_hook};

    #[test]
    fn test_pool_state_reports_live_balances() {
        let pool = weighted_pool(ProtocolVersion::V3, "52110", "51290.5", "0.01");
        let state = pool.get_pool_state(None).unwrap();
        assert_eq!(state.pool_type, PoolType::Weighted);
        assert_eq!(state.balances_live_scale18, vec!["52110", "51290.5"]);
        assert_eq!(state.token_rates, vec!["1", "1"]);
        assert_eq!(state.swap_fee, "0.01");
        assert!(state.amp.is_none());
        assert!(state.hook_type.is_none());
    }

    #[test]
    fn test_pool_state_hook_name_override() {
        let pool = with_hook(
            weighted_pool(ProtocolVersion::V3, "100", "100", "0.01"),
            HookState::DirectionalFee,
        );
        assert_eq!(
            pool.get_pool_state(None).unwrap().hook_type,
            Some(HookType::DirectionalFee)
        );
        assert_eq!(
            pool.get_pool_state(Some("stable-surge")).unwrap().hook_type,
            Some(HookType::StableSurge)
        );
        // unknown names drop the hook rather than failing
        assert!(pool.get_pool_state(Some("NOPE")).unwrap().hook_type.is_none());
    }

    #[test]
    fn test_pool_state_reports_amp() {
        let pool = stable_pool(ProtocolVersion::V3, "10000", "10000", 1000, "0.001");
        let state = pool.get_pool_state(None).unwrap();
        assert_eq!(state.pool_type, PoolType::Stable);
        assert_eq!(state.amp.as_deref(), Some("1000"));
    }
}
