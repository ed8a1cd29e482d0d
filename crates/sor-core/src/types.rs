//! Core type definitions for the router

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::Error;

/// EVM address (20 bytes, lowercase hex with `0x` prefix)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address. Accepts mixed case input.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let stripped = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .unwrap_or(value);
        let bytes = hex::decode(stripped)
            .map_err(|e| Error::Serialization(format!("invalid address {}: {}", value, e)))?;
        if bytes.len() != 20 {
            return Err(Error::Serialization(format!(
                "invalid address {}: expected 20 bytes, got {}",
                value,
                bytes.len()
            )));
        }
        Ok(Self(format!("0x{}", hex::encode(bytes))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Chain {
    Mainnet,
    Arbitrum,
    Avalanche,
    Base,
    Fraxtal,
    Gnosis,
    Mode,
    Optimism,
    Polygon,
    Sepolia,
    Sonic,
    Zkevm,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "MAINNET",
            Self::Arbitrum => "ARBITRUM",
            Self::Avalanche => "AVALANCHE",
            Self::Base => "BASE",
            Self::Fraxtal => "FRAXTAL",
            Self::Gnosis => "GNOSIS",
            Self::Mode => "MODE",
            Self::Optimism => "OPTIMISM",
            Self::Polygon => "POLYGON",
            Self::Sepolia => "SEPOLIA",
            Self::Sonic => "SONIC",
            Self::Zkevm => "ZKEVM",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Arbitrum => 42161,
            Self::Avalanche => 43114,
            Self::Base => 8453,
            Self::Fraxtal => 252,
            Self::Gnosis => 100,
            Self::Mode => 34443,
            Self::Optimism => 10,
            Self::Polygon => 137,
            Self::Sepolia => 11155111,
            Self::Sonic => 146,
            Self::Zkevm => 1101,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vault generation a pool is registered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    V2,
    V3,
}

impl ProtocolVersion {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            other => Err(Error::Serialization(format!(
                "unsupported protocol version {}",
                other
            ))),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        version.as_u8()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

/// Which side of a swap carries the fixed amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapKind {
    GivenIn,
    GivenOut,
}

impl SwapKind {
    pub fn reversed(&self) -> Self {
        match self {
            Self::GivenIn => Self::GivenOut,
            Self::GivenOut => Self::GivenIn,
        }
    }
}

impl fmt::Display for SwapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GivenIn => write!(f, "GivenIn"),
            Self::GivenOut => write!(f, "GivenOut"),
        }
    }
}

/// Hook families the router knows how to simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookType {
    ExitFee,
    DirectionalFee,
    StableSurge,
}

impl HookType {
    /// Map a data-layer hook name. Returns `None` for hooks the router cannot simulate.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().replace('-', "_").as_str() {
            "EXIT_FEE" | "EXITFEE" => Some(Self::ExitFee),
            "DIRECTIONAL_FEE" | "DIRECTIONALFEE" => Some(Self::DirectionalFee),
            "STABLE_SURGE" | "STABLESURGE" => Some(Self::StableSurge),
            _ => None,
        }
    }
}

/// Constants
pub mod constants {
    /// Decimals of pool share tokens
    pub const BPT_DECIMALS: u8 = 18;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalization() {
        let addr = Address::parse("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap();
        assert_eq!(addr.as_str(), "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzz86991c6218b36c1d19d4a2e9eb0ce3606eb48").is_err());
    }

    #[test]
    fn test_address_serde() {
        let json = "\"0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48\"";
        let addr: Address = serde_json::from_str(json).unwrap();
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48\""
        );
    }

    #[test]
    fn test_protocol_version_serde() {
        let v: ProtocolVersion = serde_json::from_str("3").unwrap();
        assert_eq!(v, ProtocolVersion::V3);
        assert!(serde_json::from_str::<ProtocolVersion>("4").is_err());
        assert_eq!(serde_json::to_string(&ProtocolVersion::V2).unwrap(), "2");
    }

    #[test]
    fn test_chain_display() {
        assert_eq!(Chain::Mainnet.as_str(), "MAINNET");
        assert_eq!(Chain::Arbitrum.chain_id(), 42161);
        let chain: Chain = serde_json::from_str("\"GNOSIS\"").unwrap();
        assert_eq!(chain, Chain::Gnosis);
    }

    #[test]
    fn test_hook_type_names() {
        assert_eq!(HookType::from_name("STABLE_SURGE"), Some(HookType::StableSurge));
        assert_eq!(HookType::from_name("ExitFee"), Some(HookType::ExitFee));
        assert_eq!(HookType::from_name("directional-fee"), Some(HookType::DirectionalFee));
        assert_eq!(HookType::from_name("LOTTERY"), None);
    }

    #[test]
    fn test_swap_kind_reversed() {
        assert_eq!(SwapKind::GivenIn.reversed(), SwapKind::GivenOut);
        assert_eq!(SwapKind::GivenOut.reversed(), SwapKind::GivenIn);
    }
}
