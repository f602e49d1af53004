//! Configuration sections

use serde::Deserialize;
use std::time::Duration;

use crate::stellar::poll::PollPolicy;
use crate::types::SettlementAsset;

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Soroban RPC endpoint
    pub rpc_url: String,
    /// Network passphrase used to derive the network id for signing
    pub network_passphrase: String,
    /// Horizon base URL, only used to print transaction links
    pub horizon_url: String,
}

#[derive(Clone, Default, Deserialize)]
pub struct SignerConfig {
    /// Secret seed of the account paying for and signing regular calls
    #[serde(default)]
    pub source_secret: String,
    /// Secret seed of the oracle admin
    #[serde(default)]
    pub admin_secret: String,
}

// Never print the secrets.
impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("source_secret", &"<redacted>")
            .field("admin_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Target oracle contract (C... strkey)
    #[serde(default)]
    pub contract_id: String,
    /// Fractional digits used to scale decimal prices into contract integers
    pub decimals: u32,
    /// Pinged after a successful manual `add-price`
    #[serde(default)]
    pub add_prices_success_heartbeat_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionConfig {
    /// Inclusion fee in stroops, added on top of the simulated resource fee
    pub base_fee: u32,
    /// Upper time bound of built transactions, in seconds from now
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Delay between two `getTransaction` calls
    pub interval_ms: u64,
    /// Multiplier applied to the delay after each unobserved poll (1.0 = fixed)
    pub backoff_factor: f64,
    /// Ceiling for the delay when backing off
    pub max_interval_ms: u64,
    /// Give up after this many seconds. 0 waits forever.
    pub timeout_secs: u64,
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.interval_ms),
            backoff_factor: self.backoff_factor,
            max_interval: Duration::from_millis(self.max_interval_ms),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    /// SQLite database holding the `prices` table
    pub db_path: String,
    /// Path of the `oracle-cli` binary. Empty means next to the running executable.
    #[serde(default)]
    pub cli_path: String,
    /// Bucket width, in seconds, submitted timestamps are aligned to
    pub resolution: u64,
    #[serde(default)]
    pub contracts: SettlementContracts,
}

/// Oracle contract instance per settlement asset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettlementContracts {
    #[serde(default)]
    pub xlm: String,
    #[serde(default)]
    pub usd: String,
}

impl SettlementContracts {
    pub fn contract_for(&self, settlement: SettlementAsset) -> &str {
        match settlement {
            SettlementAsset::Xlm => &self.xlm,
            SettlementAsset::Usd => &self.usd,
        }
    }
}
