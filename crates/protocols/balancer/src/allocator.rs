//! Multi-path allocation
//!
//! The requested amount is cut into equal slices; each slice goes to the path
//! with the best marginal result given what the earlier slices already moved.
//! The split is then re-simulated from the original balances and kept only
//! when it beats routing everything through the best single path.

use primitive_types::U256;
use sor_core::{RouterConfig, SwapKind};
use tracing::debug;

use crate::error::Result;
use crate::path::{BalanceArena, Path, PathWithAmount};
use crate::pools::Pool;
use crate::token::TokenAmount;

/// Split search settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub steps: usize,
    pub max_paths_in_split: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

impl From<&RouterConfig> for AllocatorConfig {
    fn from(config: &RouterConfig) -> Self {
        Self {
            steps: config.allocation_steps.max(1),
            max_paths_in_split: config.max_paths_in_split.max(1),
        }
    }
}

/// Whether `candidate` is a strictly better result than `incumbent`. For
/// GivenIn that is more output; for GivenOut less input, a zero input meaning
/// the amount could not be served at all.
fn is_better(kind: SwapKind, candidate: U256, incumbent: Option<U256>) -> bool {
    if candidate.is_zero() {
        return false;
    }
    match (kind, incumbent) {
        (_, None) => true,
        (SwapKind::GivenIn, Some(best)) => candidate > best,
        (SwapKind::GivenOut, Some(best)) => candidate < best,
    }
}

fn with_amounts(
    path: &Path,
    kind: SwapKind,
    given: &TokenAmount,
    calculated: TokenAmount,
) -> PathWithAmount {
    let (input_amount, output_amount) = match kind {
        SwapKind::GivenIn => (given.clone(), calculated),
        SwapKind::GivenOut => (calculated, given.clone()),
    };
    PathWithAmount {
        path: path.clone(),
        input_amount,
        output_amount,
    }
}

/// `path` carrying the requested amount and a zero calculated side.
pub fn unfilled(path: &Path, kind: SwapKind, amount: &TokenAmount) -> PathWithAmount {
    let calculated = match kind {
        SwapKind::GivenIn => TokenAmount::zero(path.token_out().clone()),
        SwapKind::GivenOut => TokenAmount::zero(path.token_in().clone()),
    };
    with_amounts(path, kind, amount, calculated)
}

/// Calculated side of a set of allocations
pub fn total_calculated(paths: &[PathWithAmount], kind: SwapKind) -> U256 {
    paths
        .iter()
        .map(|p| match kind {
            SwapKind::GivenIn => p.output_amount.amount,
            SwapKind::GivenOut => p.input_amount.amount,
        })
        .fold(U256::zero(), |acc, x| acc.saturating_add(x))
}

/// Distribute `amount` (the given side of the swap) over the ranked `paths`.
///
/// Returns the allocated paths, or the top candidate with a zero calculated
/// amount when no path can serve the amount. An empty `paths` yields an empty
/// result.
pub fn allocate(
    pools: &[Pool],
    paths: &[Path],
    kind: SwapKind,
    amount: &TokenAmount,
    config: &AllocatorConfig,
) -> Result<Vec<PathWithAmount>> {
    let top = match paths.first() {
        Some(top) => top,
        None => return Ok(Vec::new()),
    };
    if amount.is_zero() {
        return Ok(vec![unfilled(top, kind, amount)]);
    }
    let candidates = &paths[..paths.len().min(config.max_paths_in_split.max(1))];

    // ----- Best single path -----
    let mut single: Option<(usize, TokenAmount)> = None;
    for (i, path) in candidates.iter().enumerate() {
        let result = BalanceArena::new(pools).simulate_or_zero(path, kind, amount, false)?;
        if is_better(kind, result.amount, single.as_ref().map(|(_, r)| r.amount)) {
            single = Some((i, result));
        }
    }
    let (single_index, single_result) = match single {
        Some(best) => best,
        None => {
            debug!(candidates = candidates.len(), "No candidate path can serve the amount");
            return Ok(vec![unfilled(top, kind, amount)]);
        }
    };
    let single_allocation = vec![with_amounts(
        &candidates[single_index],
        kind,
        amount,
        single_result.clone(),
    )];

    if candidates.len() < 2 || config.steps < 2 {
        return Ok(single_allocation);
    }

    // ----- Greedy slices -----
    let assigned = match assign_slices(pools, candidates, kind, amount, config.steps)? {
        Some(assigned) => assigned,
        None => return Ok(single_allocation),
    };
    if assigned.iter().filter(|a| !a.is_zero()).count() < 2 {
        return Ok(single_allocation);
    }

    // ----- Recompute the split from the original balances -----
    let mut arena = BalanceArena::new(pools);
    let mut split = Vec::new();
    for (path, given) in candidates.iter().zip(&assigned) {
        if given.is_zero() {
            continue;
        }
        let given = TokenAmount::from_raw(amount.token.clone(), *given)?;
        let result = arena.simulate_or_zero(path, kind, &given, true)?;
        if result.is_zero() {
            debug!(path = %path.key(), "Split leg infeasible on recompute");
            return Ok(single_allocation);
        }
        split.push(with_amounts(path, kind, &given, result));
    }

    let split_total = total_calculated(&split, kind);
    if is_better(kind, split_total, Some(single_result.amount)) {
        debug!(
            legs = split.len(),
            split = %split_total,
            single = %single_result.amount,
            "Split allocation beats the best single path"
        );
        Ok(split)
    } else {
        Ok(single_allocation)
    }
}

/// Raw given amount per candidate after the greedy pass, or `None` when some
/// slice fits no path.
fn assign_slices(
    pools: &[Pool],
    candidates: &[Path],
    kind: SwapKind,
    amount: &TokenAmount,
    steps: usize,
) -> Result<Option<Vec<U256>>> {
    let steps_u256 = U256::from(steps);
    let (slice, steps) = if amount.amount < steps_u256 {
        (amount.amount, 1)
    } else {
        (amount.amount / steps_u256, steps)
    };
    let remainder = amount.amount - slice * U256::from(steps);

    let mut arena = BalanceArena::new(pools);
    let mut assigned = vec![U256::zero(); candidates.len()];

    for step in 0..steps {
        let raw = if step + 1 == steps { slice + remainder } else { slice };
        let piece = TokenAmount::from_raw(amount.token.clone(), raw)?;

        // probe every candidate against the balances moved so far
        let mut best: Option<(usize, U256)> = None;
        for (i, path) in candidates.iter().enumerate() {
            let marginal = arena.simulate_or_zero(path, kind, &piece, false)?;
            if is_better(kind, marginal.amount, best.map(|(_, b)| b)) {
                best = Some((i, marginal.amount));
            }
        }
        let chosen = match best {
            Some((i, _)) => i,
            None => return Ok(None),
        };
        arena.simulate(&candidates[chosen], kind, &piece, true)?;
        assigned[chosen] = assigned[chosen].saturating_add(raw);
    }

    Ok(Some(assigned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{amount, token_a, token_b, token_c, weighted_pair};
    use crate::token::Token;
    use sor_core::ProtocolVersion;

    fn v2_pair(byte: u8, first: (Token, &str), second: (Token, &str)) -> Pool {
        weighted_pair(byte, ProtocolVersion::V2, first, second, "0.003")
    }

    fn direct(pools: &[Pool], index: usize) -> Path {
        Path {
            tokens: vec![token_a(), token_b()],
            pools: vec![index],
            pool_ids: vec![pools[index].id().to_string()],
            is_buffer: vec![false],
        }
    }

    fn config(steps: usize) -> AllocatorConfig {
        AllocatorConfig {
            steps,
            max_paths_in_split: 3,
        }
    }

    /// Two equally deep A/B pools
    fn twin_pools() -> Vec<Pool> {
        vec![
            v2_pair(0x01, (token_a(), "10000"), (token_b(), "10000")),
            v2_pair(0x02, (token_a(), "10000"), (token_b(), "10000")),
        ]
    }

    // -- Splitting --

    #[test]
    fn test_split_beats_single_path() {
        let pools = twin_pools();
        let paths = vec![direct(&pools, 0), direct(&pools, 1)];
        let amount_in = amount(&token_a(), "2000");

        let result = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(10)).unwrap();
        assert_eq!(result.len(), 2);

        // halves on each pool
        assert_eq!(result[0].input_amount.amount, result[1].input_amount.amount);
        let total_in = result[0].input_amount.add(&result[1].input_amount).unwrap();
        assert_eq!(total_in, amount_in);

        let single = BalanceArena::new(&pools)
            .simulate(&paths[0], SwapKind::GivenIn, &amount_in, false)
            .unwrap();
        assert!(total_calculated(&result, SwapKind::GivenIn) > single.amount);
    }

    #[test]
    fn test_given_out_split_needs_less_input() {
        let pools = twin_pools();
        let paths = vec![direct(&pools, 0), direct(&pools, 1)];
        let target = amount(&token_b(), "2000");

        let result = allocate(&pools, &paths, SwapKind::GivenOut, &target, &config(10)).unwrap();
        assert_eq!(result.len(), 2);
        let total_out = result[0].output_amount.add(&result[1].output_amount).unwrap();
        assert_eq!(total_out, target);

        let single = BalanceArena::new(&pools)
            .simulate(&paths[0], SwapKind::GivenOut, &target, false)
            .unwrap();
        assert!(total_calculated(&result, SwapKind::GivenOut) < single.amount);
    }

    #[test]
    fn test_shallow_second_path_gets_little() {
        let pools = vec![
            v2_pair(0x01, (token_a(), "100000"), (token_b(), "100000")),
            v2_pair(0x02, (token_a(), "100"), (token_b(), "100")),
        ];
        let paths = vec![direct(&pools, 0), direct(&pools, 1)];
        let amount_in = amount(&token_a(), "100");

        let result = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(10)).unwrap();
        // every slice prefers the deep pool
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, paths[0]);
    }

    #[test]
    fn test_single_step_uses_best_single_path() {
        let pools = vec![
            v2_pair(0x01, (token_a(), "1000"), (token_b(), "1000")),
            v2_pair(0x02, (token_a(), "5000"), (token_b(), "5000")),
        ];
        let paths = vec![direct(&pools, 0), direct(&pools, 1)];
        let amount_in = amount(&token_a(), "100");

        let result = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(1)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, paths[1]);
        assert_eq!(result[0].input_amount, amount_in);
    }

    #[test]
    fn test_deterministic() {
        let pools = twin_pools();
        let paths = vec![direct(&pools, 0), direct(&pools, 1)];
        let amount_in = amount(&token_a(), "1234.5");
        let first = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(10)).unwrap();
        let second = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(10)).unwrap();
        assert_eq!(first, second);
    }

    // -- Infeasible --

    #[test]
    fn test_infeasible_amount_returns_zero_top_path() {
        let pools = vec![v2_pair(0x01, (token_a(), "1000"), (token_b(), "1000"))];
        let paths = vec![direct(&pools, 0)];
        // beyond the 30% in-ratio
        let amount_in = amount(&token_a(), "500");

        let result = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(10)).unwrap();
        assert_eq!(result.len(), 1);
        assert!(result[0].output_amount.is_zero());
        assert_eq!(result[0].input_amount, amount_in);

        let target = amount(&token_b(), "500");
        let result = allocate(&pools, &paths, SwapKind::GivenOut, &target, &config(10)).unwrap();
        assert!(result[0].input_amount.is_zero());
        assert_eq!(result[0].output_amount, target);
    }

    #[test]
    fn test_partial_feasibility_falls_back() {
        // the A/C/B detour cannot carry the amount; the direct pool can
        let pools = vec![
            v2_pair(0x01, (token_a(), "10000"), (token_b(), "10000")),
            v2_pair(0x02, (token_a(), "10"), (token_c(), "10")),
            v2_pair(0x03, (token_c(), "10"), (token_b(), "10")),
        ];
        let detour = Path {
            tokens: vec![token_a(), token_c(), token_b()],
            pools: vec![1, 2],
            pool_ids: vec![pools[1].id().to_string(), pools[2].id().to_string()],
            is_buffer: vec![false, false],
        };
        let paths = vec![detour, direct(&pools, 0)];
        let amount_in = amount(&token_a(), "1000");

        let result = allocate(&pools, &paths, SwapKind::GivenIn, &amount_in, &config(10)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, paths[1]);
        assert!(!result[0].output_amount.is_zero());
    }

    #[test]
    fn test_no_paths() {
        let pools = twin_pools();
        let result = allocate(&pools, &[], SwapKind::GivenIn, &amount(&token_a(), "1"), &config(10)).unwrap();
        assert!(result.is_empty());
    }
}
