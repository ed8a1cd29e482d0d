//! Pool snapshot records as written by the data layer, and their conversion into
//! simulation-ready pools.

use std::collections::{HashMap, HashSet};

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use sor_core::{Address, Chain, HookType, ProtocolVersion, RouterConfig};
use tracing::debug;

use crate::error::{Result, SorError};
use crate::fixed_point::{self, parse_units, ONE};
use crate::hooks::{HookParams, HookState};
use crate::math::gyro_e::{DerivedEclpParams, EclpParams, Vector2};
use crate::pools::{
    BufferPool, Gyro2Pool, GyroEPool, LiquidityManagement, Pool, PoolCommon, PoolToken,
    StablePool, WeightedPool,
};
use crate::signed_fixed_point::parse_signed;
use crate::token::Token;

/// Amplification strings carry this many implied decimals once scaled by
/// `AMP_PRECISION`.
const AMP_DECIMALS: u8 = 3;

/// Decimals of the derived E-CLP parameters
const DERIVED_DECIMALS: u8 = 38;

/// Everything the data layer knows about one chain and vault version
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    #[serde(default)]
    pub pools: Vec<PoolRecord>,
    /// Metadata for the underlying assets of ERC4626 tokens
    #[serde(default)]
    pub underlying_tokens: Vec<TokenRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub address: Address,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolTokenRecord {
    pub address: Address,
    pub index: usize,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    /// Human decimal
    pub balance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_rate: Option<String>,
    #[serde(default)]
    pub is_erc4626: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_token_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unwrap_rate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookRecord {
    #[serde(rename = "type")]
    pub hook_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_fee_percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surge_threshold_percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge_fee_percentage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub id: String,
    pub address: Address,
    pub chain: Chain,
    pub protocol_version: ProtocolVersion,
    #[serde(rename = "type")]
    pub pool_type: String,
    /// Human decimal, e.g. "0.003"
    pub swap_fee: String,
    #[serde(default = "default_swap_enabled")]
    pub swap_enabled: bool,
    /// Human decimal BPT supply
    pub total_shares: String,
    /// USD, only used for the liquidity floor
    #[serde(default)]
    pub total_liquidity: f64,
    pub tokens: Vec<PoolTokenRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqrt_alpha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqrt_beta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_alpha_x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_alpha_y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_beta_x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau_beta_y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub u: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_sq: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookRecord>,
    #[serde(default)]
    pub liquidity_management: LiquidityManagement,
}

fn default_swap_enabled() -> bool {
    true
}

impl PoolSnapshot {
    /// Drop pools the router must not route through for this request shape.
    pub fn eligible(self, consider_pools_with_hooks: bool, config: &RouterConfig) -> Self {
        let before = self.pools.len();
        let pools: Vec<PoolRecord> = self
            .pools
            .into_iter()
            .filter(|pool| pool.is_eligible(consider_pools_with_hooks, config))
            .collect();
        debug!(before, after = pools.len(), "Filtered pool snapshot");
        Self {
            pools,
            underlying_tokens: self.underlying_tokens,
        }
    }

    /// Keep only the named pools.
    pub fn with_pool_ids(self, pool_ids: &[String]) -> Self {
        let wanted: HashSet<&str> = pool_ids.iter().map(String::as_str).collect();
        Self {
            pools: self
                .pools
                .into_iter()
                .filter(|pool| wanted.contains(pool.id.as_str()))
                .collect(),
            underlying_tokens: self.underlying_tokens,
        }
    }
}

impl PoolRecord {
    pub fn is_eligible(&self, consider_pools_with_hooks: bool, config: &RouterConfig) -> bool {
        if !self.swap_enabled
            || self.total_liquidity < config.min_liquidity_usd
            || config.excluded_pool_ids.iter().any(|id| id == &self.id)
        {
            return false;
        }
        match &self.hook {
            Some(hook) if !consider_pools_with_hooks => HookType::from_name(&hook.hook_type)
                .is_some_and(|hook_type| Some(hook_type) == config.always_included_hook),
            _ => true,
        }
    }

    /// Build the simulation pool. Returns `None` for pool types the router does
    /// not support.
    pub fn to_pool(&self) -> Result<Option<Pool>> {
        let pool = match self.pool_type.as_str() {
            "WEIGHTED" => {
                let weights = self
                    .pool_tokens()
                    .map(|t| {
                        let weight = t.weight.as_deref().ok_or_else(|| self.missing("weight"))?;
                        parse_units(weight, 18)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Pool::Weighted(WeightedPool::new(self.common()?, weights)?)
            }
            "STABLE" | "COMPOSABLE_STABLE" | "META_STABLE" => {
                let amp = self.amp.as_deref().ok_or_else(|| self.missing("amp"))?;
                Pool::Stable(StablePool::new(self.common()?, parse_units(amp, AMP_DECIMALS)?)?)
            }
            "GYRO" | "GYRO2" => {
                let (sqrt_alpha, sqrt_beta) = self.sqrt_range()?;
                Pool::Gyro2(Gyro2Pool::new(self.common()?, sqrt_alpha, sqrt_beta)?)
            }
            "GYROE" => Pool::GyroE(GyroEPool::new(
                self.common()?,
                self.eclp_params()?,
                self.derived_eclp_params()?,
            )?),
            other => {
                debug!(pool_id = %self.id, pool_type = other, "Skipping unsupported pool type");
                return Ok(None);
            }
        };
        Ok(Some(pool))
    }

    /// Pool tokens in index order. A composable pool's own BPT is not a trading
    /// token.
    fn pool_tokens(&self) -> impl Iterator<Item = &PoolTokenRecord> {
        let mut tokens: Vec<&PoolTokenRecord> = self
            .tokens
            .iter()
            .filter(|t| t.address != self.address)
            .collect();
        tokens.sort_by_key(|t| t.index);
        tokens.into_iter()
    }

    fn common(&self) -> Result<PoolCommon> {
        let tokens = self
            .pool_tokens()
            .enumerate()
            .map(|(position, record)| {
                let rate = match &record.price_rate {
                    Some(rate) => parse_units(rate, 18)?,
                    None => ONE,
                };
                PoolToken::new(
                    token_from_pool_record(self.chain, record),
                    position,
                    parse_units(&record.balance, record.decimals)?,
                    rate,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let hook = match &self.hook {
            Some(record) => HookState::resolve(&self.id, &record.hook_type, &record.params()?),
            None => None,
        };

        Ok(PoolCommon {
            id: self.id.clone(),
            address: self.address.clone(),
            chain: self.chain,
            protocol_version: self.protocol_version,
            swap_fee: parse_units(&self.swap_fee, 18)?,
            tokens,
            total_shares: parse_units(&self.total_shares, 18)?,
            hook,
            liquidity_management: self.liquidity_management.clone(),
        })
    }

    /// `sqrtAlpha`/`sqrtBeta`, derived from `alpha`/`beta` when absent.
    fn sqrt_range(&self) -> Result<(U256, U256)> {
        let bound = |sqrt: &Option<String>, plain: &Option<String>, name: &str| -> Result<U256> {
            match (sqrt, plain) {
                (Some(sqrt), _) => parse_units(sqrt, 18),
                (None, Some(plain)) => fixed_point::sqrt(parse_units(plain, 18)?),
                (None, None) => Err(self.missing(name)),
            }
        };
        Ok((
            bound(&self.sqrt_alpha, &self.alpha, "sqrtAlpha")?,
            bound(&self.sqrt_beta, &self.beta, "sqrtBeta")?,
        ))
    }

    fn eclp_params(&self) -> Result<EclpParams> {
        let field = |value: &Option<String>, name: &str| -> Result<_> {
            parse_signed(value.as_deref().ok_or_else(|| self.missing(name))?, 18)
        };
        Ok(EclpParams {
            alpha: field(&self.alpha, "alpha")?,
            beta: field(&self.beta, "beta")?,
            c: field(&self.c, "c")?,
            s: field(&self.s, "s")?,
            lambda: field(&self.lambda, "lambda")?,
        })
    }

    /// Derived E-CLP parameters when the record carries all of them.
    fn derived_eclp_params(&self) -> Result<Option<DerivedEclpParams>> {
        let fields = [
            &self.tau_alpha_x,
            &self.tau_alpha_y,
            &self.tau_beta_x,
            &self.tau_beta_y,
            &self.u,
            &self.v,
            &self.w,
            &self.z,
            &self.d_sq,
        ];
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            match field {
                Some(value) => values.push(parse_signed(value, DERIVED_DECIMALS)?),
                None => return Ok(None),
            }
        }
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Some(DerivedEclpParams {
            tau_alpha: Vector2::new(next(), next()),
            tau_beta: Vector2::new(next(), next()),
            u: next(),
            v: next(),
            w: next(),
            z: next(),
            d_sq: next(),
        }))
    }

    fn missing(&self, field: &str) -> SorError {
        SorError::InvalidPoolData {
            pool_id: self.id.clone(),
            reason: format!("{} pool without {}", self.pool_type, field),
        }
    }
}

impl HookRecord {
    fn params(&self) -> Result<HookParams> {
        let pct = |value: &Option<String>| value.as_deref().map(|v| parse_units(v, 18)).transpose();
        Ok(HookParams {
            exit_fee_percentage: pct(&self.exit_fee_percentage)?,
            amp: self
                .amp
                .as_deref()
                .map(|amp| parse_units(amp, AMP_DECIMALS))
                .transpose()?,
            surge_threshold_percentage: pct(&self.surge_threshold_percentage)?,
            max_surge_fee_percentage: pct(&self.max_surge_fee_percentage)?,
        })
    }
}

fn token_from_pool_record(chain: Chain, record: &PoolTokenRecord) -> Token {
    let token = Token::new(chain, record.address.clone(), record.decimals);
    match &record.symbol {
        Some(symbol) => token.with_symbol(symbol.clone()),
        None => token,
    }
}

/// Pools of one request plus the token directory used to resolve addresses.
#[derive(Debug, Clone, Default)]
pub struct PoolSet {
    pub pools: Vec<Pool>,
    tokens: HashMap<Address, Token>,
}

impl PoolSet {
    /// Convert every supported record and add a buffer for each V3 ERC4626 token
    /// whose underlying asset is known.
    pub fn from_snapshot(snapshot: &PoolSnapshot) -> Result<Self> {
        let mut set = Self::default();
        let underlying: HashMap<&Address, &TokenRecord> = snapshot
            .underlying_tokens
            .iter()
            .map(|t| (&t.address, t))
            .collect();
        let mut buffered: HashSet<Address> = HashSet::new();

        for record in &snapshot.pools {
            let pool = match record.to_pool()? {
                Some(pool) => pool,
                None => continue,
            };
            for token in pool.tradable_tokens() {
                set.register(token);
            }

            if record.protocol_version == ProtocolVersion::V3 {
                for token_record in record.pool_tokens().filter(|t| t.is_erc4626) {
                    let underlying_address = match &token_record.underlying_token_address {
                        Some(address) => address,
                        None => continue,
                    };
                    let underlying_record = match underlying.get(underlying_address) {
                        Some(record) => *record,
                        None => continue,
                    };
                    if !buffered.insert(token_record.address.clone()) {
                        continue;
                    }
                    let buffer = buffer_from_records(record.chain, token_record, underlying_record)?;
                    set.register(buffer.underlying().clone());
                    set.pools.push(Pool::Buffer(buffer));
                }
            }
            set.pools.push(pool);
        }

        debug!(
            pools = set.pools.len(),
            tokens = set.tokens.len(),
            "Built pool set"
        );
        Ok(set)
    }

    pub fn token(&self, address: &Address) -> Option<&Token> {
        self.tokens.get(address)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    fn register(&mut self, token: Token) {
        self.tokens.entry(token.address.clone()).or_insert(token);
    }
}

impl From<Vec<Pool>> for PoolSet {
    fn from(pools: Vec<Pool>) -> Self {
        let mut set = Self::default();
        for pool in &pools {
            for token in pool.tradable_tokens() {
                set.register(token);
            }
        }
        set.pools = pools;
        set
    }
}

fn buffer_from_records(
    chain: Chain,
    wrapped: &PoolTokenRecord,
    underlying: &TokenRecord,
) -> Result<BufferPool> {
    let rate = match &wrapped.price_rate {
        Some(rate) => parse_units(rate, 18)?,
        None => ONE,
    };
    let unwrap_rate = wrapped
        .unwrap_rate
        .as_deref()
        .map(|r| parse_units(r, 18))
        .transpose()?;
    let underlying_token = Token::new(chain, underlying.address.clone(), underlying.decimals);
    let underlying_token = match &underlying.symbol {
        Some(symbol) => underlying_token.with_symbol(symbol.clone()),
        None => underlying_token,
    };
    BufferPool::new(
        chain,
        token_from_pool_record(chain, wrapped),
        underlying_token,
        rate,
        unwrap_rate,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::PoolType;

    fn snapshot_json() -> &'static str {
        r#"{
            "pools": [
                {
                    "id": "0x0101010101010101010101010101010101010101",
                    "address": "0x0101010101010101010101010101010101010101",
                    "chain": "MAINNET",
                    "protocolVersion": 3,
                    "type": "WEIGHTED",
                    "swapFee": "0.01",
                    "totalShares": "100000",
                    "totalLiquidity": 104000.0,
                    "tokens": [
                        {"address": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "index": 1, "decimals": 18, "balance": "51290", "weight": "0.5"},
                        {"address": "0xa5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5", "index": 0, "decimals": 6, "balance": "52110", "weight": "0.5",
                         "priceRate": "1.05", "isErc4626": true,
                         "underlyingTokenAddress": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}
                    ]
                },
                {
                    "id": "stable-pool",
                    "address": "0x0202020202020202020202020202020202020202",
                    "chain": "MAINNET",
                    "protocolVersion": 3,
                    "type": "STABLE",
                    "swapFee": "0.001",
                    "totalShares": "1000",
                    "tokens": [
                        {"address": "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb", "index": 0, "decimals": 18, "balance": "500"},
                        {"address": "0xcccccccccccccccccccccccccccccccccccccccc", "index": 1, "decimals": 18, "balance": "500"}
                    ],
                    "amp": "1000",
                    "hook": {"type": "STABLE_SURGE", "amp": "1000", "surgeThresholdPercentage": "0.3", "maxSurgeFeePercentage": "0.05"}
                },
                {
                    "id": "lbp",
                    "address": "0x0303030303030303030303030303030303030303",
                    "chain": "MAINNET",
                    "protocolVersion": 3,
                    "type": "LIQUIDITY_BOOTSTRAPPING",
                    "swapFee": "0.01",
                    "totalShares": "1",
                    "tokens": []
                }
            ],
            "underlyingTokens": [
                {"address": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "decimals": 6, "symbol": "A"}
            ]
        }"#
    }

    fn snapshot() -> PoolSnapshot {
        serde_json::from_str(snapshot_json()).unwrap()
    }

    #[test]
    fn test_pool_set_from_snapshot() {
        let set = PoolSet::from_snapshot(&snapshot()).unwrap();
        // weighted + stable + synthesized buffer; the unsupported type is skipped
        assert_eq!(set.len(), 3);
        let types: Vec<PoolType> = set.pools.iter().map(Pool::pool_type).collect();
        assert!(types.contains(&PoolType::Buffer));

        let weighted = set
            .pools
            .iter()
            .find(|p| p.pool_type() == PoolType::Weighted)
            .unwrap();
        // tokens are ordered by index regardless of record order
        assert_eq!(weighted.common().tokens[0].token.decimals, 6);
        assert_eq!(weighted.common().tokens[0].rate, parse_units("1.05", 18).unwrap());

        let underlying = Address::parse("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        assert_eq!(set.token(&underlying).unwrap().symbol.as_deref(), Some("A"));
    }

    #[test]
    fn test_stable_hook_and_amp_parsed() {
        let set = PoolSet::from_snapshot(&snapshot()).unwrap();
        let stable = set.pools.iter().find(|p| p.id() == "stable-pool").unwrap();
        assert_eq!(
            stable.common().hook,
            Some(HookState::StableSurge {
                amp: U256::from(1_000_000u64),
                surge_threshold_percentage: parse_units("0.3", 18).unwrap(),
                max_surge_fee_percentage: parse_units("0.05", 18).unwrap(),
            })
        );
    }

    #[test]
    fn test_stable_without_amp_is_a_data_error() {
        let mut snapshot = snapshot();
        snapshot.pools[1].amp = None;
        assert!(matches!(
            PoolSet::from_snapshot(&snapshot),
            Err(SorError::InvalidPoolData { .. })
        ));
    }

    #[test]
    fn test_eligibility_filter() {
        let mut config = RouterConfig::default();

        // StableSurge is always included, even without hooks requested
        let filtered = snapshot().eligible(false, &config);
        assert!(filtered.pools.iter().any(|p| p.id == "stable-pool"));

        config.always_included_hook = None;
        let filtered = snapshot().eligible(false, &config);
        assert!(!filtered.pools.iter().any(|p| p.id == "stable-pool"));
        let filtered = snapshot().eligible(true, &config);
        assert!(filtered.pools.iter().any(|p| p.id == "stable-pool"));

        config.min_liquidity_usd = 1000.0;
        config.excluded_pool_ids = vec!["lbp".into()];
        let filtered = snapshot().eligible(true, &config);
        let ids: Vec<&str> = filtered.pools.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["0x0101010101010101010101010101010101010101"]);
    }

    #[test]
    fn test_disabled_swaps_are_ineligible() {
        let mut snapshot = snapshot();
        snapshot.pools[0].swap_enabled = false;
        let filtered = snapshot.eligible(true, &RouterConfig::default());
        assert_eq!(filtered.pools.len(), 2);
    }

    #[test]
    fn test_gyro_sqrt_range_from_alpha_beta() {
        let mut record = snapshot().pools[1].clone();
        record.pool_type = "GYRO".into();
        record.alpha = Some("0.81".into());
        record.beta = Some("1.21".into());
        let pool = record.to_pool().unwrap().unwrap();
        match pool {
            Pool::Gyro2(p) => {
                assert_eq!(p.sqrt_alpha, parse_units("0.9", 18).unwrap());
                assert_eq!(p.sqrt_beta, parse_units("1.1", 18).unwrap());
            }
            _ => panic!("expected a 2-CLP pool"),
        }
    }

    #[test]
    fn test_with_pool_ids() {
        let narrowed = snapshot().with_pool_ids(&["stable-pool".to_string()]);
        assert_eq!(narrowed.pools.len(), 1);
        assert_eq!(narrowed.underlying_tokens.len(), 1);
    }
}
