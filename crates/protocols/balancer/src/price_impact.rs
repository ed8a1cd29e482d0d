//! Price impact of a quote, estimated by trading the result back
//!
//! The chosen paths are walked in reverse with the calculated amounts; half the
//! relative loss of the round trip is the impact of one leg.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sor_core::SwapKind;
use tracing::warn;

use crate::error::{Result, SorError};
use crate::fixed_point::{self, format_units};
use crate::path::{BalanceArena, PathWithAmount};
use crate::records::PoolSet;

/// Either a decimal fraction (`"0.0125"` is 1.25%) or the reason it could not
/// be computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceImpact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceImpact {
    pub fn from_fraction(value: U256) -> Self {
        Self {
            value: Some(format_units(value, 18)),
            error: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            value: None,
            error: Some(reason.into()),
        }
    }
}

/// Price impact of `paths`; a failed reverse simulation is reported in the
/// result rather than as an error.
pub fn estimate_price_impact(paths: &[PathWithAmount], kind: SwapKind, pools: &PoolSet) -> PriceImpact {
    match reverse_round_trip(paths, kind, pools) {
        Ok(impact) => PriceImpact::from_fraction(impact),
        Err(e) => {
            warn!(error = %e, "Price impact unavailable");
            PriceImpact::unavailable(e.to_string())
        }
    }
}

/// GivenIn sells the output back and compares the input recovered; GivenOut
/// buys the input back and compares the output spent.
fn reverse_round_trip(paths: &[PathWithAmount], kind: SwapKind, pools: &PoolSet) -> Result<U256> {
    let mut arena = BalanceArena::new(&pools.pools);
    let mut initial = U256::zero();
    let mut round_trip = U256::zero();

    for leg in paths {
        let reversed = leg.path.reversed();
        let (given, start) = match kind {
            SwapKind::GivenIn => (&leg.output_amount, &leg.input_amount),
            SwapKind::GivenOut => (&leg.input_amount, &leg.output_amount),
        };
        let result = arena.simulate(&reversed, kind, given, true)?;
        initial = fixed_point::add(initial, start.scale18)?;
        round_trip = fixed_point::add(round_trip, result.scale18)?;
    }

    if initial.is_zero() || round_trip.is_zero() {
        return Err(SorError::TradeAmountTooSmall);
    }
    let loss = match kind {
        SwapKind::GivenIn => initial.saturating_sub(round_trip),
        SwapKind::GivenOut => round_trip.saturating_sub(initial),
    };
    fixed_point::div_down(loss, fixed_point::mul(initial, U256::from(2u8))?)
}
