//! Pool graph and candidate path search
//!
//! Tokens are nodes; every pool contributes a directed edge per ordered pair of
//! tradable tokens (BPT included for V3), and every ERC4626 buffer a wrap and an
//! unwrap edge. The search walks the graph level by level, keeps the most liquid
//! partial paths and ranks complete ones by their bottleneck liquidity.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use primitive_types::U256;
use sor_core::{Address, GraphTraversalConfig};
use tracing::debug;

use crate::path::Path;
use crate::pools::Pool;
use crate::token::Token;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A directed hop through one pool.
#[derive(Debug, Clone)]
pub struct PoolEdge {
    pub pool_index: usize,
    pub pool_id: String,
    pub token_in: Token,
    pub token_out: Token,
    pub normalized_liquidity: U256,
    pub is_buffer: bool,
}

/// Adjacency-list pool graph keyed by token address.
#[derive(Debug, Clone, Default)]
pub struct PoolGraph {
    pub adjacency: HashMap<Address, Vec<PoolEdge>>,
    pub pool_count: usize,
}

// ---------------------------------------------------------------------------
// Step 1: Graph construction
// ---------------------------------------------------------------------------

/// Build the graph over `pools`, keeping at most `max_pools_per_pair` edges per
/// directed token pair, the most liquid first.
pub fn build_pool_graph(pools: &[Pool], max_pools_per_pair: usize) -> PoolGraph {
    let mut adjacency: HashMap<Address, Vec<PoolEdge>> = HashMap::new();
    let mut pool_count = 0;

    for (pool_index, pool) in pools.iter().enumerate() {
        let tokens = pool.tradable_tokens();
        let mut added = false;
        for token_in in &tokens {
            for token_out in &tokens {
                if token_in == token_out {
                    continue;
                }
                let liquidity = match pool.get_normalized_liquidity(token_in, token_out) {
                    Ok(liquidity) if !liquidity.is_zero() => liquidity,
                    Ok(_) => continue,
                    Err(e) => {
                        debug!(pool_id = pool.id(), error = %e, "Skipping pool edge");
                        continue;
                    }
                };
                adjacency
                    .entry(token_in.address.clone())
                    .or_default()
                    .push(PoolEdge {
                        pool_index,
                        pool_id: pool.id().to_string(),
                        token_in: token_in.clone(),
                        token_out: token_out.clone(),
                        normalized_liquidity: liquidity,
                        is_buffer: pool.is_buffer(),
                    });
                added = true;
            }
        }
        if added {
            pool_count += 1;
        }
    }

    // Prune: keep top N per (token_in, token_out) pair by liquidity
    for edges in adjacency.values_mut() {
        let mut by_target: HashMap<&Address, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            by_target.entry(&edge.token_out.address).or_default().push(i);
        }

        let mut keep: HashSet<usize> = HashSet::new();
        for indices in by_target.values() {
            let mut sorted: Vec<usize> = indices.clone();
            sorted.sort_by(|&a, &b| {
                edges[b]
                    .normalized_liquidity
                    .cmp(&edges[a].normalized_liquidity)
                    .then_with(|| edges[a].pool_id.cmp(&edges[b].pool_id))
            });
            keep.extend(sorted.into_iter().take(max_pools_per_pair));
        }

        let mut i = 0;
        edges.retain(|_| {
            let retained = keep.contains(&i);
            i += 1;
            retained
        });
    }

    debug!(
        pools = pool_count,
        tokens = adjacency.len(),
        "Built pool graph"
    );
    PoolGraph {
        adjacency,
        pool_count,
    }
}

// ---------------------------------------------------------------------------
// Step 2: Path search
// ---------------------------------------------------------------------------

/// Ranked candidate paths from `token_in` to `token_out`. When nothing is found
/// within `config`, the search runs once more with both depth limits raised by
/// one, never beyond `max_search_depth`.
pub fn find_candidate_paths(
    graph: &PoolGraph,
    token_in: &Token,
    token_out: &Token,
    config: &GraphTraversalConfig,
    max_search_depth: usize,
    beam_width: usize,
) -> Vec<Path> {
    let paths = search(graph, token_in, token_out, config, beam_width);
    if !paths.is_empty() {
        return paths;
    }

    let deeper = GraphTraversalConfig {
        max_depth: (config.max_depth + 1).min(max_search_depth),
        max_non_boosted_path_depth: (config.max_non_boosted_path_depth + 1).min(max_search_depth),
        ..config.clone()
    };
    if deeper == *config {
        return paths;
    }
    debug!(
        token_in = %token_in,
        token_out = %token_out,
        max_depth = deeper.max_depth,
        max_non_boosted_path_depth = deeper.max_non_boosted_path_depth,
        "No path at default depth, retrying deeper"
    );
    search(graph, token_in, token_out, &deeper, beam_width)
}

/// Bottleneck liquidity of a path; buffer edges are unbounded.
fn min_liquidity(edges: &[PoolEdge]) -> U256 {
    edges
        .iter()
        .map(|e| e.normalized_liquidity)
        .min()
        .unwrap_or(U256::MAX)
}

fn path_key(edges: &[PoolEdge]) -> String {
    edges
        .iter()
        .map(|e| e.pool_id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Most liquid first, then by pool ids so equal inputs always rank equally.
fn rank(a: &(U256, String), b: &(U256, String)) -> Ordering {
    b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}

/// Whether a complete path respects the traversal limits for its kind.
fn is_admissible(edges: &[PoolEdge], config: &GraphTraversalConfig) -> bool {
    let boosted = edges.iter().any(|e| e.is_buffer);
    if !boosted {
        return edges.len() <= config.max_non_boosted_path_depth;
    }
    if edges.len() > config.max_depth {
        return false;
    }
    // intermediate tokens reached without touching a buffer
    let plain_hop_tokens = (1..edges.len())
        .filter(|&j| !edges[j - 1].is_buffer && !edges[j].is_buffer)
        .count();
    plain_hop_tokens <= config.max_non_boosted_hop_tokens_in_boosted_path
}

fn search(
    graph: &PoolGraph,
    token_in: &Token,
    token_out: &Token,
    config: &GraphTraversalConfig,
    beam_width: usize,
) -> Vec<Path> {
    let max_len = config.max_depth.max(config.max_non_boosted_path_depth);
    let mut results: Vec<(U256, String, Vec<PoolEdge>)> = Vec::new();

    type SearchState = (Address, Vec<PoolEdge>, HashSet<Address>, HashSet<usize>);
    let mut frontier: Vec<SearchState> = vec![(
        token_in.address.clone(),
        Vec::new(),
        HashSet::from([token_in.address.clone()]),
        HashSet::new(),
    )];

    for _ in 0..max_len {
        let mut next: Vec<SearchState> = Vec::new();
        for (current, path, visited, used_pools) in &frontier {
            let edges = match graph.adjacency.get(current) {
                Some(edges) => edges,
                None => continue,
            };
            for edge in edges {
                if used_pools.contains(&edge.pool_index) {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(edge.clone());

                if edge.token_out == *token_out {
                    if is_admissible(&new_path, config) {
                        results.push((min_liquidity(&new_path), path_key(&new_path), new_path));
                    }
                } else if new_path.len() < max_len && !visited.contains(&edge.token_out.address) {
                    let mut new_visited = visited.clone();
                    new_visited.insert(edge.token_out.address.clone());
                    let mut new_pools = used_pools.clone();
                    new_pools.insert(edge.pool_index);
                    next.push((edge.token_out.address.clone(), new_path, new_visited, new_pools));
                }
            }
        }

        if next.is_empty() {
            break;
        }
        // Beam: keep the most liquid partial paths
        if next.len() > beam_width {
            let mut scored: Vec<((U256, String), SearchState)> = next
                .into_iter()
                .map(|state| ((min_liquidity(&state.1), path_key(&state.1)), state))
                .collect();
            scored.sort_by(|a, b| rank(&a.0, &b.0));
            scored.truncate(beam_width);
            next = scored.into_iter().map(|(_, state)| state).collect();
        }
        frontier = next;
    }

    results.sort_by(|a, b| rank(&(a.0, a.1.clone()), &(b.0, b.1.clone())));
    results.truncate(config.approx_paths_to_return);

    debug!(
        token_in = %token_in,
        token_out = %token_out,
        found = results.len(),
        "Path search finished"
    );
    results
        .into_iter()
        .map(|(_, _, edges)| to_path(token_in, &edges))
        .collect()
}

fn to_path(token_in: &Token, edges: &[PoolEdge]) -> Path {
    let mut tokens = Vec::with_capacity(edges.len() + 1);
    tokens.push(token_in.clone());
    tokens.extend(edges.iter().map(|e| e.token_out.clone()));
    Path {
        tokens,
        pools: edges.iter().map(|e| e.pool_index).collect(),
        pool_ids: edges.iter().map(|e| e.pool_id.clone()).collect(),
        is_buffer: edges.iter().map(|e| e.is_buffer).collect(),
    }
}
