//! Smart order router facade
//!
//! Fetches the eligible pools for each vault version, searches and allocates
//! paths per version, picks the better version and prices the result.

use std::sync::Arc;

use primitive_types::U256;
use sor_core::{Address, Chain, GraphTraversalConfig, ProtocolVersion, SwapKind};
use tracing::{debug, info};

use crate::allocator::{self, allocate, AllocatorConfig};
use crate::cache::{CacheKey, Clock, PoolDataCache, SystemClock};
use crate::error::{Result, SorError};
use crate::fixed_point::{self, format_units};
use crate::graph::{build_pool_graph, find_candidate_paths};
use crate::path::{Path, PathWithAmount};
use crate::price_impact::{estimate_price_impact, PriceImpact};
use crate::records::PoolSet;
use crate::source::PoolSource;
use crate::token::TokenAmount;

/// One quote request
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub chain: Chain,
    pub token_in: Address,
    pub token_out: Address,
    pub swap_kind: SwapKind,
    /// Raw amount of the given side
    pub amount: U256,
    /// Quote a single vault version instead of comparing both
    pub protocol_version: Option<ProtocolVersion>,
    pub pool_ids: Option<Vec<String>>,
    pub consider_pools_with_hooks: bool,
    pub graph_traversal_config: Option<GraphTraversalConfig>,
}

/// Best quote found. Amounts are raw.
#[derive(Debug, Clone)]
pub struct SwapResult {
    pub protocol_version: ProtocolVersion,
    pub swap_kind: SwapKind,
    pub paths: Vec<PathWithAmount>,
    pub token_in_amount: U256,
    pub token_out_amount: U256,
    /// Calculated side: output for GivenIn, input for GivenOut. Zero means no route.
    pub return_amount: U256,
    /// Input per unit of output as a decimal string
    pub effective_price: String,
    pub price_impact: PriceImpact,
}

/// Allocated paths of one vault version together with the pools they ran on
#[derive(Debug, Clone)]
pub struct VersionQuote {
    pub protocol_version: ProtocolVersion,
    pub paths: Vec<PathWithAmount>,
    pub pools: PoolSet,
}

impl VersionQuote {
    pub fn return_amount(&self, kind: SwapKind) -> U256 {
        allocator::total_calculated(&self.paths, kind)
    }
}

/// Pick the economically better quote. GivenIn prefers more output, GivenOut
/// less input; a zero result always loses. V2 is chosen only when strictly
/// better.
pub fn select_protocol_version(
    v2: Option<VersionQuote>,
    v3: Option<VersionQuote>,
    kind: SwapKind,
) -> Option<VersionQuote> {
    match (v2, v3) {
        (Some(v2), Some(v3)) => {
            let (a, b) = (v2.return_amount(kind), v3.return_amount(kind));
            let v2_wins = match kind {
                _ if a.is_zero() => false,
                _ if b.is_zero() => true,
                SwapKind::GivenIn => a > b,
                SwapKind::GivenOut => a < b,
            };
            debug!(%kind, v2 = %a, v3 = %b, v2_wins, "Compared vault versions");
            Some(if v2_wins { v2 } else { v3 })
        }
        (v2, v3) => v2.or(v3),
    }
}

pub struct SmartOrderRouter<S, C = SystemClock> {
    cache: Arc<PoolDataCache<S, C>>,
}

impl<S, C> Clone for SmartOrderRouter<S, C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<S: PoolSource, C: Clock> SmartOrderRouter<S, C> {
    pub fn new(cache: Arc<PoolDataCache<S, C>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &PoolDataCache<S, C> {
        &self.cache
    }

    /// Best paths for `request`. Unreachable pairs come back as a single path
    /// with a zero return amount; only unknown tokens, corrupt pool data and
    /// data-source failures are errors.
    pub async fn get_swap_paths(&self, request: &SwapRequest) -> Result<SwapResult> {
        if request.token_in == request.token_out {
            return Err(SorError::InvalidRequest(
                "tokenIn and tokenOut must differ".into(),
            ));
        }

        let chosen = match request.protocol_version {
            Some(version) => self.quote_version(request, version).await?,
            None => {
                let (v2, v3) = tokio::try_join!(
                    self.quote_version(request, ProtocolVersion::V2),
                    self.quote_version(request, ProtocolVersion::V3),
                )?;
                select_protocol_version(v2, v3, request.swap_kind)
            }
        };
        let quote = chosen.ok_or_else(|| {
            SorError::UnknownToken(format!("{} or {}", request.token_in, request.token_out))
        })?;

        let result = self.finish(request.swap_kind, quote)?;
        info!(
            chain = %request.chain,
            version = %result.protocol_version,
            kind = %request.swap_kind,
            paths = result.paths.len(),
            return_amount = %result.return_amount,
            "Quote complete"
        );
        Ok(result)
    }

    /// Search and allocate against one vault version. `None` when either token
    /// is unknown to that version's pools.
    pub async fn quote_version(
        &self,
        request: &SwapRequest,
        version: ProtocolVersion,
    ) -> Result<Option<VersionQuote>> {
        let key = CacheKey {
            chain: request.chain,
            protocol_version: version,
            consider_pools_with_hooks: request.consider_pools_with_hooks,
        };
        let snapshot = self.cache.get(key, request.pool_ids.as_deref()).await?;
        let pools = PoolSet::from_snapshot(&snapshot)?;

        let (token_in, token_out) = match (
            pools.token(&request.token_in),
            pools.token(&request.token_out),
        ) {
            (Some(token_in), Some(token_out)) => (token_in.clone(), token_out.clone()),
            _ => {
                debug!(%version, "Token not present in this version's pools");
                return Ok(None);
            }
        };

        let config = self.cache.config();
        let traversal = request
            .graph_traversal_config
            .clone()
            .unwrap_or_else(|| config.graph.clone());
        let given = match request.swap_kind {
            SwapKind::GivenIn => &token_in,
            SwapKind::GivenOut => &token_out,
        };
        let amount = TokenAmount::from_raw(given.clone(), request.amount)?;

        let graph = build_pool_graph(&pools.pools, config.max_pools_per_pair);
        let candidates = find_candidate_paths(
            &graph,
            &token_in,
            &token_out,
            &traversal,
            config.max_search_depth,
            config.beam_width,
        );

        let paths = if candidates.is_empty() {
            debug!(%version, "No candidate paths");
            vec![allocator::unfilled(
                &Path::no_route(token_in, token_out),
                request.swap_kind,
                &amount,
            )]
        } else {
            allocate(
                &pools.pools,
                &candidates,
                request.swap_kind,
                &amount,
                &AllocatorConfig::from(config),
            )?
        };

        Ok(Some(VersionQuote {
            protocol_version: version,
            paths,
            pools,
        }))
    }

    fn finish(&self, kind: SwapKind, quote: VersionQuote) -> Result<SwapResult> {
        let sum = |f: fn(&PathWithAmount) -> U256| -> Result<U256> {
            quote
                .paths
                .iter()
                .try_fold(U256::zero(), |acc, p| fixed_point::add(acc, f(p)))
        };
        let token_in_amount = sum(|p| p.input_amount.amount)?;
        let token_out_amount = sum(|p| p.output_amount.amount)?;
        let in_scale18 = sum(|p| p.input_amount.scale18)?;
        let out_scale18 = sum(|p| p.output_amount.scale18)?;

        let return_amount = match kind {
            SwapKind::GivenIn => token_out_amount,
            SwapKind::GivenOut => token_in_amount,
        };

        let (effective_price, price_impact) = if return_amount.is_zero() {
            ("0".to_string(), PriceImpact::unavailable("no route"))
        } else {
            (
                format_units(fixed_point::div_down(in_scale18, out_scale18)?, 18),
                estimate_price_impact(&quote.paths, kind, &quote.pools),
            )
        };

        Ok(SwapResult {
            protocol_version: quote.protocol_version,
            swap_kind: kind,
            paths: quote.paths,
            token_in_amount,
            token_out_amount,
            return_amount,
            effective_price,
            price_impact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::fixtures::{address, amount, token_a, token_b, token_c, token_d};
    use crate::records::PoolSnapshot;
    use crate::source::InMemoryPoolSource;
    use crate::token::Token;
    use serde_json::json;
    use sor_core::RouterConfig;

    /// 50/50 weighted pool record
    fn weighted_record(
        byte: u8,
        version: ProtocolVersion,
        first: (&Token, &str),
        second: (&Token, &str),
        fee: &str,
    ) -> serde_json::Value {
        let token = |(token, balance): (&Token, &str), index: usize| {
            json!({
                "address": token.address,
                "index": index,
                "decimals": token.decimals,
                "balance": balance,
                "weight": "0.5",
            })
        };
        json!({
            "id": address(byte).to_string(),
            "address": address(byte),
            "chain": "MAINNET",
            "protocolVersion": version.as_u8(),
            "type": "WEIGHTED",
            "swapFee": fee,
            "totalShares": "100000",
            "totalLiquidity": 100000.0,
            "tokens": [token(first, 0), token(second, 1)],
        })
    }

    fn snapshot(pools: Vec<serde_json::Value>) -> PoolSnapshot {
        serde_json::from_value(json!({ "pools": pools })).unwrap()
    }

    fn router(
        v2: Vec<serde_json::Value>,
        v3: Vec<serde_json::Value>,
    ) -> SmartOrderRouter<InMemoryPoolSource, Arc<ManualClock>> {
        let source = InMemoryPoolSource::new()
            .with_snapshot(Chain::Mainnet, ProtocolVersion::V2, snapshot(v2))
            .with_snapshot(Chain::Mainnet, ProtocolVersion::V3, snapshot(v3));
        let cache = PoolDataCache::with_clock(
            source,
            RouterConfig::default(),
            Arc::new(ManualClock::new()),
        );
        SmartOrderRouter::new(Arc::new(cache))
    }

    fn request(token_in: &Token, token_out: &Token, kind: SwapKind, raw: U256) -> SwapRequest {
        SwapRequest {
            chain: Chain::Mainnet,
            token_in: token_in.address.clone(),
            token_out: token_out.address.clone(),
            swap_kind: kind,
            amount: raw,
            protocol_version: None,
            pool_ids: None,
            consider_pools_with_hooks: false,
            graph_traversal_config: None,
        }
    }

    fn a_to_b(kind: SwapKind, human: &str) -> SwapRequest {
        let given = match kind {
            SwapKind::GivenIn => token_a(),
            SwapKind::GivenOut => token_b(),
        };
        request(&token_a(), &token_b(), kind, amount(&given, human).amount)
    }

    // -- Quotes --

    #[tokio::test]
    async fn test_given_in_quote() {
        let router = router(
            vec![weighted_record(0x01, ProtocolVersion::V2, (&token_a(), "52110"), (&token_b(), "51290"), "0.01")],
            vec![],
        );
        let result = router
            .get_swap_paths(&a_to_b(SwapKind::GivenIn, "1000"))
            .await
            .unwrap();

        assert_eq!(result.protocol_version, ProtocolVersion::V2);
        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.token_in_amount, amount(&token_a(), "1000").amount);
        assert_eq!(result.return_amount, result.token_out_amount);
        assert!(!result.return_amount.is_zero());
        assert!(result.price_impact.value.is_some());

        // roughly one A per B plus fee and slippage
        let price: f64 = result.effective_price.parse().unwrap();
        assert!(price > 1.0 && price < 1.1, "{}", price);
    }

    #[tokio::test]
    async fn test_given_out_quote() {
        let router = router(
            vec![],
            vec![weighted_record(0x01, ProtocolVersion::V3, (&token_a(), "52110"), (&token_b(), "51290"), "0.01")],
        );
        let result = router
            .get_swap_paths(&a_to_b(SwapKind::GivenOut, "100"))
            .await
            .unwrap();
        assert_eq!(result.protocol_version, ProtocolVersion::V3);
        assert_eq!(result.token_out_amount, amount(&token_b(), "100").amount);
        assert_eq!(result.return_amount, result.token_in_amount);
        assert!(result.return_amount > amount(&token_a(), "100").amount);
    }

    #[tokio::test]
    async fn test_better_version_wins() {
        let deep = |version| weighted_record(0x01, version, (&token_a(), "100000"), (&token_b(), "100000"), "0.001");
        let shallow = |version| weighted_record(0x02, version, (&token_a(), "5000"), (&token_b(), "5000"), "0.01");

        let router_v3 = router(vec![shallow(ProtocolVersion::V2)], vec![deep(ProtocolVersion::V3)]);
        let result = router_v3.get_swap_paths(&a_to_b(SwapKind::GivenIn, "1000")).await.unwrap();
        assert_eq!(result.protocol_version, ProtocolVersion::V3);

        let router_v2 = router(vec![deep(ProtocolVersion::V2)], vec![shallow(ProtocolVersion::V3)]);
        let result = router_v2.get_swap_paths(&a_to_b(SwapKind::GivenOut, "1000")).await.unwrap();
        assert_eq!(result.protocol_version, ProtocolVersion::V2);

        // an explicit version is honoured even when worse
        let mut explicit = a_to_b(SwapKind::GivenIn, "1000");
        explicit.protocol_version = Some(ProtocolVersion::V2);
        let result = router_v3.get_swap_paths(&explicit).await.unwrap();
        assert_eq!(result.protocol_version, ProtocolVersion::V2);
    }

    #[tokio::test]
    async fn test_no_path_is_a_zero_result() {
        // A/C and D/B never meet
        let router = router(
            vec![],
            vec![
                weighted_record(0x01, ProtocolVersion::V3, (&token_a(), "1000"), (&token_c(), "1000"), "0.01"),
                weighted_record(0x02, ProtocolVersion::V3, (&token_d(), "1000"), (&token_b(), "1000"), "0.01"),
            ],
        );
        let result = router
            .get_swap_paths(&a_to_b(SwapKind::GivenIn, "10"))
            .await
            .unwrap();
        assert_eq!(result.paths.len(), 1);
        assert!(result.paths[0].output_amount.is_zero());
        assert!(result.paths[0].path.pools.is_empty());
        assert!(result.return_amount.is_zero());
        assert_eq!(result.effective_price, "0");
        assert!(result.price_impact.value.is_none());

        let result = router
            .get_swap_paths(&a_to_b(SwapKind::GivenOut, "10"))
            .await
            .unwrap();
        assert!(result.paths[0].input_amount.is_zero());
        assert!(result.return_amount.is_zero());
    }

    #[tokio::test]
    async fn test_zero_version_loses() {
        // V2 cannot serve 500 of a 1000 pool; V3 can
        let router = router(
            vec![weighted_record(0x01, ProtocolVersion::V2, (&token_a(), "1000"), (&token_b(), "1000"), "0.001")],
            vec![weighted_record(0x02, ProtocolVersion::V3, (&token_a(), "100000"), (&token_b(), "100000"), "0.01")],
        );
        let result = router.get_swap_paths(&a_to_b(SwapKind::GivenOut, "500")).await.unwrap();
        assert_eq!(result.protocol_version, ProtocolVersion::V3);
        assert!(!result.return_amount.is_zero());
    }

    // -- Errors --

    #[tokio::test]
    async fn test_unknown_token() {
        let router = router(
            vec![weighted_record(0x01, ProtocolVersion::V2, (&token_a(), "1000"), (&token_b(), "1000"), "0.01")],
            vec![],
        );
        let unknown = Token::new(Chain::Mainnet, address(0x77), 18);
        let err = router
            .get_swap_paths(&request(&token_a(), &unknown, SwapKind::GivenIn, U256::from(1_000_000u64)))
            .await
            .unwrap_err();
        assert!(matches!(err, SorError::UnknownToken(_)));
    }

    #[tokio::test]
    async fn test_identical_tokens_rejected() {
        let router = router(vec![], vec![]);
        let err = router
            .get_swap_paths(&request(&token_a(), &token_a(), SwapKind::GivenIn, U256::one()))
            .await
            .unwrap_err();
        assert!(matches!(err, SorError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_snapshot_propagates() {
        let source = InMemoryPoolSource::new();
        let cache = PoolDataCache::new(source, RouterConfig::default());
        let router = SmartOrderRouter::new(Arc::new(cache));
        let err = router
            .get_swap_paths(&a_to_b(SwapKind::GivenIn, "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, SorError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_repeated_quotes_are_identical() {
        let router = router(
            vec![],
            vec![
                weighted_record(0x01, ProtocolVersion::V3, (&token_a(), "10000"), (&token_b(), "10000"), "0.003"),
                weighted_record(0x02, ProtocolVersion::V3, (&token_a(), "10000"), (&token_c(), "10000"), "0.003"),
                weighted_record(0x03, ProtocolVersion::V3, (&token_c(), "10000"), (&token_b(), "10000"), "0.003"),
            ],
        );
        let first = router.get_swap_paths(&a_to_b(SwapKind::GivenIn, "2000")).await.unwrap();
        let second = router.get_swap_paths(&a_to_b(SwapKind::GivenIn, "2000")).await.unwrap();
        assert_eq!(first.paths, second.paths);
        assert_eq!(first.return_amount, second.return_amount);
        // the amount is split over the direct and the C route
        assert_eq!(first.paths.len(), 2);
    }
}
