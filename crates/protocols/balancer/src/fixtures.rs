//! Pool and token builders shared by the unit tests

use primitive_types::U256;
use sor_core::{Address, Chain, ProtocolVersion};

use crate::fixed_point::{parse_units, ONE};
use crate::hooks::HookState;
use crate::math::gyro_e::EclpParams;
use crate::math::stable::AMP_PRECISION;
use crate::pools::{
    BufferPool, Gyro2Pool, GyroEPool, LiquidityManagement, Pool, PoolCommon, PoolToken,
    StablePool, WeightedPool,
};
use crate::signed_fixed_point::parse_signed;
use crate::token::{Token, TokenAmount};

pub fn address(byte: u8) -> Address {
    Address::parse(&format!("0x{}", format!("{:02x}", byte).repeat(20))).unwrap()
}

pub fn token(byte: u8, decimals: u8) -> Token {
    Token::new(Chain::Mainnet, address(byte), decimals)
}

pub fn token_a() -> Token {
    token(0xaa, 6).with_symbol("A")
}

pub fn token_b() -> Token {
    token(0xbb, 18).with_symbol("B")
}

pub fn token_c() -> Token {
    token(0xcc, 18).with_symbol("C")
}

pub fn token_d() -> Token {
    token(0xdd, 18).with_symbol("D")
}

/// Human amount of `token`
pub fn amount(token: &Token, value: &str) -> TokenAmount {
    TokenAmount::from_raw(token.clone(), parse_units(value, token.decimals).unwrap()).unwrap()
}

pub fn common(
    address_byte: u8,
    version: ProtocolVersion,
    balances: &[(Token, &str)],
    fee: &str,
) -> PoolCommon {
    let address = address(address_byte);
    let tokens = balances
        .iter()
        .enumerate()
        .map(|(index, (token, balance))| {
            PoolToken::new(
                token.clone(),
                index,
                parse_units(balance, token.decimals).unwrap(),
                ONE,
            )
            .unwrap()
        })
        .collect();
    PoolCommon {
        id: address.to_string(),
        address,
        chain: Chain::Mainnet,
        protocol_version: version,
        swap_fee: parse_units(fee, 18).unwrap(),
        tokens,
        total_shares: U256::from(100_000u64) * ONE,
        hook: None,
        liquidity_management: LiquidityManagement::default(),
    }
}

/// 50/50 weighted pool over any two tokens
pub fn weighted_pair(
    address_byte: u8,
    version: ProtocolVersion,
    first: (Token, &str),
    second: (Token, &str),
    fee: &str,
) -> Pool {
    let half = parse_units("0.5", 18).unwrap();
    Pool::Weighted(
        WeightedPool::new(
            common(address_byte, version, &[first, second], fee),
            vec![half, half],
        )
        .unwrap(),
    )
}

/// 50/50 weighted pool over A (6 decimals) and B (18 decimals)
pub fn weighted_pool(version: ProtocolVersion, balance_a: &str, balance_b: &str, fee: &str) -> Pool {
    weighted_pair(0x01, version, (token_a(), balance_a), (token_b(), balance_b), fee)
}

pub fn stable_pool(
    version: ProtocolVersion,
    balance_a: &str,
    balance_b: &str,
    amp: u64,
    fee: &str,
) -> Pool {
    let common = common(
        0x02,
        version,
        &[(token_a(), balance_a), (token_b(), balance_b)],
        fee,
    );
    Pool::Stable(StablePool::new(common, U256::from(amp) * AMP_PRECISION).unwrap())
}

/// 2-CLP over A and B with a 0.9..1.1 price range
pub fn gyro2_pool(version: ProtocolVersion, balance_a: &str, balance_b: &str, fee: &str) -> Pool {
    let common = common(
        0x03,
        version,
        &[(token_a(), balance_a), (token_b(), balance_b)],
        fee,
    );
    Pool::Gyro2(
        Gyro2Pool::new(
            common,
            U256::from(948_683_298_050_513_799u128),
            U256::from(1_048_808_848_170_151_546u128),
        )
        .unwrap(),
    )
}

pub fn eclp_params() -> EclpParams {
    EclpParams {
        alpha: parse_signed("0.9", 18).unwrap(),
        beta: parse_signed("1.1", 18).unwrap(),
        c: parse_signed("0.707106781186547524", 18).unwrap(),
        s: parse_signed("0.707106781186547524", 18).unwrap(),
        lambda: parse_signed("10", 18).unwrap(),
    }
}

pub fn gyro_e_pool(version: ProtocolVersion, balance_a: &str, balance_b: &str, fee: &str) -> Pool {
    let common = common(
        0x04,
        version,
        &[(token_a(), balance_a), (token_b(), balance_b)],
        fee,
    );
    Pool::GyroE(GyroEPool::new(common, eclp_params(), None).unwrap())
}

/// Buffer between a wrapped share and its underlying, `rate` assets per share
pub fn buffer_pool(wrapped: Token, underlying: Token, rate: &str) -> BufferPool {
    BufferPool::new(
        Chain::Mainnet,
        wrapped,
        underlying,
        parse_units(rate, 18).unwrap(),
        None,
    )
    .unwrap()
}

pub fn with_hook(mut pool: Pool, hook: HookState) -> Pool {
    pool.common_mut().hook = Some(hook);
    pool
}

pub fn with_liquidity_management(mut pool: Pool, management: LiquidityManagement) -> Pool {
    pool.common_mut().liquidity_management = management;
    pool
}
