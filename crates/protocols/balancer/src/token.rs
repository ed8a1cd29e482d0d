//! Token identity and amounts carried in raw and scale18 form

use std::fmt;
use std::hash::{Hash, Hasher};

use primitive_types::U256;
use sor_core::{Address, Chain};

use crate::error::{Result, SorError};
use crate::fixed_point::{self, Rounding};

/// An ERC20 token on a given chain. Equality ignores decimals and symbol.
#[derive(Debug, Clone)]
pub struct Token {
    pub chain: Chain,
    pub address: Address,
    pub decimals: u8,
    pub symbol: Option<String>,
}

impl Token {
    pub fn new(chain: Chain, address: Address, decimals: u8) -> Self {
        Self {
            chain,
            address,
            decimals,
            symbol: None,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn is_same_address(&self, address: &Address) -> bool {
        &self.address == address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain.hash(state);
        self.address.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{} ({})", symbol, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// An amount of a token. `scale18 == amount * 10^(18 - decimals)` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAmount {
    pub token: Token,
    pub amount: U256,
    pub scale18: U256,
}

impl TokenAmount {
    pub fn from_raw(token: Token, amount: U256) -> Result<Self> {
        let scale18 = fixed_point::mul(amount, fixed_point::scaling_factor(token.decimals)?)?;
        Ok(Self {
            token,
            amount,
            scale18,
        })
    }

    /// Downscale a scale18 value. The raw amount is rounded per `rounding` and the
    /// scale18 field recomputed from it so both stay consistent.
    pub fn from_scale18(token: Token, scale18: U256, rounding: Rounding) -> Result<Self> {
        let factor = fixed_point::scaling_factor(token.decimals)?;
        let amount = match rounding {
            Rounding::Down => scale18 / factor,
            Rounding::Up => fixed_point::div_up_raw(scale18, factor)?,
        };
        Self::from_raw(token, amount)
    }

    pub fn zero(token: Token) -> Self {
        Self {
            token,
            amount: U256::zero(),
            scale18: U256::zero(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn add(&self, other: &TokenAmount) -> Result<Self> {
        self.ensure_same_token(other)?;
        Self::from_raw(self.token.clone(), fixed_point::add(self.amount, other.amount)?)
    }

    pub fn sub(&self, other: &TokenAmount) -> Result<Self> {
        self.ensure_same_token(other)?;
        Self::from_raw(self.token.clone(), fixed_point::sub(self.amount, other.amount)?)
    }

    fn ensure_same_token(&self, other: &TokenAmount) -> Result<()> {
        if self.token != other.token {
            return Err(SorError::TokenMismatch {
                expected: self.token.address.to_string(),
                actual: other.token.address.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            fixed_point::format_units(self.amount, self.token.decimals),
            self.token
        )
    }
}
