//! Core types used throughout the oracle client
//!
//! Defines the asset tagging, price records and settlement assets shared by
//! the CLI and the batch feeder.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OracleError;

/// How the oracle contract identifies an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// A Stellar asset contract, referenced by address
    Stellar,
    /// Any other asset, referenced by a symbol such as `USD`
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Stellar => "stellar",
            AssetType::Other => "other",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stellar" => Ok(AssetType::Stellar),
            "other" => Ok(AssetType::Other),
            _ => Err(OracleError::InvalidArgument(format!(
                "unexpected asset_type: {s}"
            ))),
        }
    }
}

/// Asset argument as the contract expects it: a tagged variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OracleAsset {
    Stellar(String),
    Other(String),
}

impl OracleAsset {
    pub fn new(asset_type: AssetType, asset: impl Into<String>) -> Self {
        match asset_type {
            AssetType::Stellar => OracleAsset::Stellar(asset.into()),
            AssetType::Other => OracleAsset::Other(asset.into()),
        }
    }

    /// Contract-side variant tag
    pub fn tag(&self) -> &'static str {
        match self {
            OracleAsset::Stellar(_) => "Stellar",
            OracleAsset::Other(_) => "Other",
        }
    }
}

impl fmt::Display for OracleAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleAsset::Stellar(address) => write!(f, "Stellar({address})"),
            OracleAsset::Other(symbol) => write!(f, "Other({symbol})"),
        }
    }
}

/// One price to be added to the oracle.
///
/// This is also the element type of the base64/JSON payload accepted by
/// `add-prices-base64`, e.g.
/// `{"source": 0, "asset_type": "other", "asset": "USD", "price": "1.00", "timestamp": 12345678}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInput {
    pub source: u32,
    pub asset_type: AssetType,
    pub asset: String,
    #[serde(deserialize_with = "decimal_string")]
    pub price: String,
    pub timestamp: u64,
}

impl PriceInput {
    pub fn oracle_asset(&self) -> OracleAsset {
        OracleAsset::new(self.asset_type, self.asset.clone())
    }
}

/// Accepts the price either as a JSON string or as a bare number.
fn decimal_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Currency a price is quoted against. Each one is served by its own
/// oracle contract instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettlementAsset {
    Xlm,
    Usd,
}

impl SettlementAsset {
    pub const ALL: [SettlementAsset; 2] = [SettlementAsset::Xlm, SettlementAsset::Usd];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementAsset::Xlm => "XLM",
            SettlementAsset::Usd => "USD",
        }
    }
}

impl FromStr for SettlementAsset {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "XLM" => Ok(SettlementAsset::Xlm),
            "USD" => Ok(SettlementAsset::Usd),
            other => Err(OracleError::UnrecognizedSettlementAsset(other.to_string())),
        }
    }
}

impl fmt::Display for SettlementAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
