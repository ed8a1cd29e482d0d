//! Paths through the pool set and their simulation over a per-request balance arena

use std::collections::HashMap;

use sor_core::SwapKind;

use crate::error::Result;
use crate::pools::Pool;
use crate::token::{Token, TokenAmount};

/// A route of hops. `tokens.len() == pools.len() + 1`; hop `i` trades
/// `tokens[i]` for `tokens[i + 1]` in `pools[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub tokens: Vec<Token>,
    /// Indices into the request's pool set
    pub pools: Vec<usize>,
    pub pool_ids: Vec<String>,
    pub is_buffer: Vec<bool>,
}

impl Path {
    pub fn hops(&self) -> usize {
        self.pools.len()
    }

    pub fn token_in(&self) -> &Token {
        &self.tokens[0]
    }

    pub fn token_out(&self) -> &Token {
        &self.tokens[self.tokens.len() - 1]
    }

    pub fn is_boosted(&self) -> bool {
        self.is_buffer.iter().any(|b| *b)
    }

    /// Stable identity used to break ranking ties.
    pub fn key(&self) -> String {
        self.pool_ids.join(",")
    }

    /// Placeholder for a pair without any route. Carries no hops, so it is the
    /// one path where `tokens.len() != pools.len() + 1`.
    pub fn no_route(token_in: Token, token_out: Token) -> Self {
        Self {
            tokens: vec![token_in, token_out],
            pools: Vec::new(),
            pool_ids: Vec::new(),
            is_buffer: Vec::new(),
        }
    }

    /// Same hops walked from `token_out` back to `token_in`.
    pub fn reversed(&self) -> Self {
        let mut reversed = self.clone();
        reversed.tokens.reverse();
        reversed.pools.reverse();
        reversed.pool_ids.reverse();
        reversed.is_buffer.reverse();
        reversed
    }
}

/// A path with the amounts it trades.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathWithAmount {
    pub path: Path,
    pub input_amount: TokenAmount,
    pub output_amount: TokenAmount,
}

/// Per-request view of the pool set. Pools are cloned on first write so the
/// shared snapshot is never mutated.
#[derive(Debug)]
pub struct BalanceArena<'a> {
    base: &'a [Pool],
    overrides: HashMap<usize, Pool>,
}

impl<'a> BalanceArena<'a> {
    pub fn new(base: &'a [Pool]) -> Self {
        Self {
            base,
            overrides: HashMap::new(),
        }
    }

    pub fn pool(&self, index: usize) -> &Pool {
        self.overrides.get(&index).unwrap_or(&self.base[index])
    }

    fn pool_mut(&mut self, index: usize) -> &mut Pool {
        let base = self.base;
        self.overrides
            .entry(index)
            .or_insert_with(|| base[index].clone())
    }

    /// Pools touched so far
    pub fn touched(&self) -> usize {
        self.overrides.len()
    }

    /// Run `amount` through `path`. GivenIn fills forward from the input and
    /// returns the output; GivenOut fills backward from the output and returns the
    /// input. With `mutate`, every hop is recorded in the arena.
    pub fn simulate(
        &mut self,
        path: &Path,
        kind: SwapKind,
        amount: &TokenAmount,
        mutate: bool,
    ) -> Result<TokenAmount> {
        let mut current = amount.clone();
        match kind {
            SwapKind::GivenIn => {
                for hop in 0..path.hops() {
                    let (token_in, token_out) = (&path.tokens[hop], &path.tokens[hop + 1]);
                    let out = self
                        .pool(path.pools[hop])
                        .swap_given_in(token_in, token_out, &current)?;
                    if mutate {
                        self.pool_mut(path.pools[hop])
                            .apply_swap(token_in, token_out, current.amount, out.amount)?;
                    }
                    current = out;
                }
            }
            SwapKind::GivenOut => {
                for hop in (0..path.hops()).rev() {
                    let (token_in, token_out) = (&path.tokens[hop], &path.tokens[hop + 1]);
                    let amount_in = self
                        .pool(path.pools[hop])
                        .swap_given_out(token_in, token_out, &current)?;
                    if mutate {
                        self.pool_mut(path.pools[hop])
                            .apply_swap(token_in, token_out, amount_in.amount, current.amount)?;
                    }
                    current = amount_in;
                }
            }
        }
        Ok(current)
    }

    /// Like [`simulate`](Self::simulate) but an amount the path cannot serve is
    /// reported as zero instead of an error.
    pub fn simulate_or_zero(
        &mut self,
        path: &Path,
        kind: SwapKind,
        amount: &TokenAmount,
        mutate: bool,
    ) -> Result<TokenAmount> {
        match self.simulate(path, kind, amount, mutate) {
            Ok(result) => Ok(result),
            Err(e) if e.is_infeasible() => {
                let token = match kind {
                    SwapKind::GivenIn => path.token_out().clone(),
                    SwapKind::GivenOut => path.token_in().clone(),
                };
                Ok(TokenAmount::zero(token))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{amount, token_a, token_b, token_c, weighted_pair};
    use primitive_types::U256;
    use sor_core::ProtocolVersion;

    fn two_pools() -> Vec<Pool> {
        vec![
            weighted_pair(
                0x01,
                ProtocolVersion::V2,
                (token_a(), "52110"),
                (token_b(), "51290"),
                "0.01",
            ),
            weighted_pair(
                0x02,
                ProtocolVersion::V3,
                (token_b(), "20000"),
                (token_c(), "40000"),
                "0.003",
            ),
        ]
    }

    fn a_to_c(pools: &[Pool]) -> Path {
        Path {
            tokens: vec![token_a(), token_b(), token_c()],
            pools: vec![0, 1],
            pool_ids: pools.iter().map(|p| p.id().to_string()).collect(),
            is_buffer: vec![false, false],
        }
    }

    #[test]
    fn test_multi_hop_composition() {
        let pools = two_pools();
        let path = a_to_c(&pools);
        let amount_in = amount(&token_a(), "1000");

        let mut arena = BalanceArena::new(&pools);
        let out = arena
            .simulate(&path, SwapKind::GivenIn, &amount_in, false)
            .unwrap();

        let hop1 = pools[0]
            .swap_given_in(&token_a(), &token_b(), &amount_in)
            .unwrap();
        let hop2 = pools[1].swap_given_in(&token_b(), &token_c(), &hop1).unwrap();
        assert_eq!(out, hop2);
    }

    #[test]
    fn test_given_out_fills_backward() {
        let pools = two_pools();
        let path = a_to_c(&pools);
        let target = amount(&token_c(), "100");

        let mut arena = BalanceArena::new(&pools);
        let needed = arena
            .simulate(&path, SwapKind::GivenOut, &target, false)
            .unwrap();

        let hop2 = pools[1].swap_given_out(&token_b(), &token_c(), &target).unwrap();
        let hop1 = pools[0].swap_given_out(&token_a(), &token_b(), &hop2).unwrap();
        assert_eq!(needed, hop1);
        assert_eq!(needed.token, token_a());
    }

    #[test]
    fn test_mutation_stays_in_arena() {
        let pools = two_pools();
        let path = a_to_c(&pools);
        let amount_in = amount(&token_a(), "1000");

        let mut arena = BalanceArena::new(&pools);
        let first = arena
            .simulate(&path, SwapKind::GivenIn, &amount_in, true)
            .unwrap();
        let second = arena
            .simulate(&path, SwapKind::GivenIn, &amount_in, true)
            .unwrap();
        // the second trade sees the moved balances
        assert!(second.amount < first.amount);
        assert_eq!(arena.touched(), 2);

        // the shared pools are untouched
        let fresh = BalanceArena::new(&pools)
            .simulate(&path, SwapKind::GivenIn, &amount_in, false)
            .unwrap();
        assert_eq!(fresh, first);
    }

    #[test]
    fn test_infeasible_amount_is_zero() {
        let pools = two_pools();
        let path = a_to_c(&pools);
        // far above the 30% in-ratio of the first pool
        let huge = amount(&token_a(), "40000");

        let mut arena = BalanceArena::new(&pools);
        assert!(arena.simulate(&path, SwapKind::GivenIn, &huge, false).is_err());
        let out = arena
            .simulate_or_zero(&path, SwapKind::GivenIn, &huge, false)
            .unwrap();
        assert_eq!(out.amount, U256::zero());
        assert_eq!(out.token, token_c());
    }

    #[test]
    fn test_reversed_path() {
        let pools = two_pools();
        let reversed = a_to_c(&pools).reversed();
        assert_eq!(reversed.token_in(), &token_c());
        assert_eq!(reversed.token_out(), &token_a());
        assert_eq!(reversed.pools, vec![1, 0]);
        assert_eq!(reversed.key(), format!("{},{}", pools[1].id(), pools[0].id()));
    }
}
