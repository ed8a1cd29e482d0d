//! Pool hooks the router can simulate
//!
//! Hooks only exist on V3 pools. `ExitFee` taxes remove-liquidity hops, the other
//! two replace the static swap fee with one computed from the trade itself.

use primitive_types::U256;
use sor_core::{HookType, SwapKind};
use tracing::warn;

use crate::error::Result;
use crate::fixed_point::{self, complement, div_down, mul_down};
use crate::math::stable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookState {
    ExitFee {
        exit_fee_percentage: U256,
    },
    DirectionalFee,
    StableSurge {
        /// Amplification including `AMP_PRECISION`
        amp: U256,
        surge_threshold_percentage: U256,
        max_surge_fee_percentage: U256,
    },
}

/// Hook parameters as read from a pool record, already parsed to scale18.
#[derive(Debug, Clone, Default)]
pub struct HookParams {
    pub exit_fee_percentage: Option<U256>,
    pub amp: Option<U256>,
    pub surge_threshold_percentage: Option<U256>,
    pub max_surge_fee_percentage: Option<U256>,
}

impl HookState {
    /// Resolve a hook from its name and parameters. Unknown hooks, or known hooks
    /// missing their parameters, leave the pool hookless.
    pub fn resolve(pool_id: &str, name: &str, params: &HookParams) -> Option<Self> {
        let state = match HookType::from_name(name) {
            Some(HookType::ExitFee) => params
                .exit_fee_percentage
                .map(|exit_fee_percentage| Self::ExitFee { exit_fee_percentage }),
            Some(HookType::DirectionalFee) => Some(Self::DirectionalFee),
            Some(HookType::StableSurge) => match (
                params.amp,
                params.surge_threshold_percentage,
                params.max_surge_fee_percentage,
            ) {
                (Some(amp), Some(threshold), Some(max_fee)) => Some(Self::StableSurge {
                    amp,
                    surge_threshold_percentage: threshold,
                    max_surge_fee_percentage: max_fee,
                }),
                _ => None,
            },
            None => {
                warn!(pool_id, hook = name, "Unsupported hook, treating pool as hookless");
                return None;
            }
        };
        if state.is_none() {
            warn!(pool_id, hook = name, "Hook parameters missing, treating pool as hookless");
        }
        state
    }

    pub fn hook_type(&self) -> HookType {
        match self {
            Self::ExitFee { .. } => HookType::ExitFee,
            Self::DirectionalFee => HookType::DirectionalFee,
            Self::StableSurge { .. } => HookType::StableSurge,
        }
    }

    pub fn exit_fee(&self) -> Option<U256> {
        match self {
            Self::ExitFee {
                exit_fee_percentage,
            } => Some(*exit_fee_percentage),
            _ => None,
        }
    }

    /// Swap fee for a trade of `amount_given` (live scale18) against `balances`.
    pub fn dynamic_swap_fee(
        &self,
        kind: SwapKind,
        amount_given: U256,
        balances: &[U256],
        index_in: usize,
        index_out: usize,
        static_fee: U256,
    ) -> Result<U256> {
        match self {
            Self::ExitFee { .. } => Ok(static_fee),
            Self::DirectionalFee => {
                directional_fee(amount_given, balances, index_in, index_out, static_fee)
            }
            Self::StableSurge {
                amp,
                surge_threshold_percentage,
                max_surge_fee_percentage,
            } => {
                let new_balances =
                    balances_after_stable_swap(*amp, kind, amount_given, balances, index_in, index_out)?;
                surge_fee(
                    balances,
                    &new_balances,
                    static_fee,
                    *surge_threshold_percentage,
                    *max_surge_fee_percentage,
                )
            }
        }
    }
}

/// Fee proportional to how far the trade pushes the pair apart, never below the
/// static fee.
fn directional_fee(
    amount_given: U256,
    balances: &[U256],
    index_in: usize,
    index_out: usize,
    static_fee: U256,
) -> Result<U256> {
    let final_in = fixed_point::add(balances[index_in], amount_given)?;
    let final_out = fixed_point::sub(balances[index_out], amount_given)?;

    let calculated = if final_in > final_out {
        div_down(final_in - final_out, fixed_point::add(final_in, final_out)?)?
    } else {
        U256::zero()
    };
    Ok(calculated.max(static_fee))
}

fn balances_after_stable_swap(
    amp: U256,
    kind: SwapKind,
    amount_given: U256,
    balances: &[U256],
    index_in: usize,
    index_out: usize,
) -> Result<Vec<U256>> {
    let invariant = stable::compute_invariant(amp, balances)?;
    let mut new_balances = balances.to_vec();
    match kind {
        SwapKind::GivenIn => {
            let out = stable::compute_out_given_exact_in(
                amp, balances, index_in, index_out, amount_given, invariant,
            )?;
            new_balances[index_in] = fixed_point::add(new_balances[index_in], amount_given)?;
            new_balances[index_out] = fixed_point::sub(new_balances[index_out], out)?;
        }
        SwapKind::GivenOut => {
            let amount_in = stable::compute_in_given_exact_out(
                amp, balances, index_in, index_out, amount_given, invariant,
            )?;
            new_balances[index_in] = fixed_point::add(new_balances[index_in], amount_in)?;
            new_balances[index_out] = fixed_point::sub(new_balances[index_out], amount_given)?;
        }
    }
    Ok(new_balances)
}

fn surge_fee(
    old_balances: &[U256],
    new_balances: &[U256],
    static_fee: U256,
    threshold: U256,
    max_fee: U256,
) -> Result<U256> {
    if max_fee < static_fee {
        return Ok(static_fee);
    }
    let new_imbalance = imbalance(new_balances)?;
    if new_imbalance.is_zero() {
        return Ok(static_fee);
    }
    let old_imbalance = imbalance(old_balances)?;
    if new_imbalance <= old_imbalance || new_imbalance <= threshold {
        return Ok(static_fee);
    }

    let surge = mul_down(
        max_fee - static_fee,
        div_down(new_imbalance - threshold, complement(threshold))?,
    )?;
    fixed_point::add(static_fee, surge)
}

/// Total distance from the median balance, relative to the total balance.
fn imbalance(balances: &[U256]) -> Result<U256> {
    let median = median(balances);
    let mut total_diff = U256::zero();
    let mut total = U256::zero();
    for balance in balances {
        let diff = if *balance > median {
            *balance - median
        } else {
            median - *balance
        };
        total_diff = fixed_point::add(total_diff, diff)?;
        total = fixed_point::add(total, *balance)?;
    }
    div_down(total_diff, total)
}

fn median(balances: &[U256]) -> U256 {
    let mut sorted = balances.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    match sorted.len() {
        0 => U256::zero(),
        n if n % 2 == 0 => (sorted[mid - 1] + sorted[mid]) / 2,
        _ => sorted[mid],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::{parse_units, ONE};

    fn pct(value: &str) -> U256 {
        parse_units(value, 18).unwrap()
    }

    fn scale18(v: u64) -> U256 {
        U256::from(v) * ONE
    }

    #[test]
    fn test_resolve_known_and_unknown_hooks() {
        let params = HookParams {
            exit_fee_percentage: Some(pct("0.05")),
            ..Default::default()
        };
        assert_eq!(
            HookState::resolve("p", "EXIT_FEE", &params),
            Some(HookState::ExitFee {
                exit_fee_percentage: pct("0.05")
            })
        );
        assert_eq!(
            HookState::resolve("p", "DirectionalFee", &HookParams::default()),
            Some(HookState::DirectionalFee)
        );
        assert_eq!(HookState::resolve("p", "LOTTERY", &params), None);
        // StableSurge without parameters cannot be simulated
        assert_eq!(HookState::resolve("p", "STABLE_SURGE", &params), None);
    }

    #[test]
    fn test_median_and_imbalance() {
        assert_eq!(median(&[scale18(3), scale18(1), scale18(2)]), scale18(2));
        assert_eq!(median(&[scale18(4), scale18(2)]), scale18(3));
        assert_eq!(imbalance(&[scale18(100), scale18(100)]).unwrap(), U256::zero());
        // |150-100| + |50-100| over 200
        assert_eq!(imbalance(&[scale18(150), scale18(50)]).unwrap(), pct("0.5"));
    }

    #[test]
    fn test_directional_fee_only_charges_unbalancing_trades() {
        let static_fee = pct("0.001");
        let balances = [scale18(1000), scale18(1000)];
        let fee = directional_fee(scale18(100), &balances, 0, 1, static_fee).unwrap();
        // (1100 - 900) / 2000
        assert_eq!(fee, pct("0.1"));

        let skewed = [scale18(500), scale18(1500)];
        let fee = directional_fee(scale18(100), &skewed, 0, 1, static_fee).unwrap();
        assert_eq!(fee, static_fee);
    }

    #[test]
    fn test_surge_fee_above_threshold() {
        let static_fee = pct("0.001");
        let hook = HookState::StableSurge {
            amp: U256::from(1_000u64) * stable::AMP_PRECISION,
            surge_threshold_percentage: pct("0.3"),
            max_surge_fee_percentage: pct("0.05"),
        };
        let balances = [scale18(10_000), scale18(10_000)];

        let small = hook
            .dynamic_swap_fee(SwapKind::GivenIn, scale18(10), &balances, 0, 1, static_fee)
            .unwrap();
        assert_eq!(small, static_fee);

        let large = hook
            .dynamic_swap_fee(SwapKind::GivenIn, scale18(5_000), &balances, 0, 1, static_fee)
            .unwrap();
        assert!(large > static_fee);
        assert!(large < pct("0.05"));
    }

    #[test]
    fn test_surge_never_below_static_when_max_is_lower() {
        let fee = surge_fee(
            &[scale18(1), scale18(1)],
            &[scale18(2), scale18(0)],
            pct("0.01"),
            pct("0.1"),
            pct("0.005"),
        )
        .unwrap();
        assert_eq!(fee, pct("0.01"));
    }
}
