//! Configuration management for the oracle client
//!
//! Loads from optional config files + environment variables via .env

mod types;

pub use types::*;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{OracleError, Result};
use crate::stellar::keys::{parse_contract_id, Keypair};

pub const TESTNET_RPC_URL: &str = "https://soroban-testnet.stellar.org";
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";
pub const TESTNET_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";

/// Flat variable names accepted in addition to the `SEP40__*` scheme.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("SOURCE_SECRET", "signer.source_secret"),
    ("ADMIN_SECRET", "signer.admin_secret"),
    ("ORACLE_CONTRACT_ID", "oracle.contract_id"),
    ("RPC_URL", "network.rpc_url"),
    ("NETWORK_PASSPHRASE", "network.network_passphrase"),
    ("HORIZON_URL", "network.horizon_url"),
    (
        "ADD_PRICES_SUCCESS_HEARTBEAT_URL",
        "oracle.add_prices_success_heartbeat_url",
    ),
    ("API_DB_PATH", "feeder.db_path"),
    ("TESTNET_CONTRACT_XLM", "feeder.contracts.xlm"),
    ("TESTNET_CONTRACT_USD", "feeder.contracts.usd"),
];

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    pub oracle: OracleConfig,
    pub transaction: TransactionConfig,
    pub poll: PollConfig,
    pub feeder: FeederConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            // Network defaults
            .set_default("network.rpc_url", TESTNET_RPC_URL)?
            .set_default("network.network_passphrase", TESTNET_PASSPHRASE)?
            .set_default("network.horizon_url", TESTNET_HORIZON_URL)?
            // Oracle defaults
            .set_default("oracle.decimals", 18)?
            // Transaction defaults
            .set_default("transaction.base_fee", 300_000)?
            .set_default("transaction.timeout_secs", 30)?
            // Poll defaults
            .set_default("poll.interval_ms", 3000)?
            .set_default("poll.backoff_factor", 1.0)?
            .set_default("poll.max_interval_ms", 30_000)?
            .set_default("poll.timeout_secs", 300)?
            // Feeder defaults
            .set_default("feeder.db_path", "../api/db.sqlite3")?
            .set_default("feeder.resolution", 600)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        for (var, key) in LEGACY_ENV_KEYS {
            builder = builder.set_override_option(*key, Self::resolve_env(var))?;
        }

        let config = builder
            // Override with environment variables (SEP40__*)
            .add_source(Environment::with_prefix("SEP40").separator("__"))
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }

    fn resolve_env(var: &str) -> Option<String> {
        std::env::var(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }

    /// Check the endpoint and the target contract. Enough for RPC passthrough.
    pub fn validate_network(&self) -> Result<()> {
        if self.network.rpc_url.trim().is_empty() {
            return Err(OracleError::Config("network.rpc_url is not set".into()));
        }
        parse_contract_id(&self.oracle.contract_id)
            .map_err(|e| OracleError::Config(format!("oracle.contract_id: {e}")))?;
        Ok(())
    }

    /// Check everything the interactive CLI needs before any network call.
    pub fn validate_cli(&self) -> Result<()> {
        self.validate_network()?;
        Keypair::from_secret(&self.signer.source_secret)
            .map_err(|e| OracleError::Config(format!("signer.source_secret: {e}")))?;
        Keypair::from_secret(&self.signer.admin_secret)
            .map_err(|e| OracleError::Config(format!("signer.admin_secret: {e}")))?;
        if self.poll.interval_ms == 0 {
            return Err(OracleError::Config("poll.interval_ms must be positive".into()));
        }
        if !(self.poll.backoff_factor >= 1.0) {
            return Err(OracleError::Config(
                "poll.backoff_factor must be at least 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Check everything the batch feeder needs.
    pub fn validate_feeder(&self) -> Result<()> {
        if self.feeder.resolution == 0 {
            return Err(OracleError::Config("feeder.resolution must be positive".into()));
        }
        if self.feeder.db_path.trim().is_empty() {
            return Err(OracleError::Config("feeder.db_path is not set".into()));
        }
        for (name, contract) in [
            ("feeder.contracts.xlm", &self.feeder.contracts.xlm),
            ("feeder.contracts.usd", &self.feeder.contracts.usd),
        ] {
            parse_contract_id(contract)
                .map_err(|e| OracleError::Config(format!("{name}: {e}")))?;
        }
        Ok(())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "rpc={} contract={} decimals={} poll={}ms x{} timeout={}s",
            self.network.rpc_url,
            self.oracle.contract_id,
            self.oracle.decimals,
            self.poll.interval_ms,
            self.poll.backoff_factor,
            self.poll.timeout_secs,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        let secret = stellar_strkey::ed25519::PrivateKey([7u8; 32]).to_string();
        AppConfig {
            network: NetworkConfig {
                rpc_url: TESTNET_RPC_URL.into(),
                network_passphrase: TESTNET_PASSPHRASE.into(),
                horizon_url: TESTNET_HORIZON_URL.into(),
            },
            signer: SignerConfig {
                source_secret: secret.clone(),
                admin_secret: secret,
            },
            oracle: OracleConfig {
                contract_id: stellar_strkey::Contract([1u8; 32]).to_string(),
                decimals: 18,
                add_prices_success_heartbeat_url: None,
            },
            transaction: TransactionConfig {
                base_fee: 300_000,
                timeout_secs: 30,
            },
            poll: PollConfig {
                interval_ms: 3000,
                backoff_factor: 1.0,
                max_interval_ms: 30_000,
                timeout_secs: 0,
            },
            feeder: FeederConfig {
                db_path: "db.sqlite3".into(),
                cli_path: String::new(),
                resolution: 600,
                contracts: SettlementContracts::default(),
            },
        }
    }

    #[test]
    fn valid_cli_settings_pass() {
        sample().validate_cli().unwrap();
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let mut cfg = sample();
        cfg.signer.admin_secret.clear();
        match cfg.validate_cli() {
            Err(OracleError::Config(msg)) => assert!(msg.contains("admin_secret")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn feeder_requires_both_settlement_contracts() {
        let mut cfg = sample();
        cfg.feeder.contracts.xlm = cfg.oracle.contract_id.clone();
        assert!(matches!(cfg.validate_feeder(), Err(OracleError::Config(_))));
        cfg.feeder.contracts.usd = cfg.oracle.contract_id.clone();
        cfg.validate_feeder().unwrap();
    }

    #[test]
    fn rpc_passthrough_needs_no_secrets() {
        let mut cfg = sample();
        cfg.signer = SignerConfig::default();
        cfg.validate_network().unwrap();
        assert!(cfg.validate_cli().is_err());

        cfg.oracle.contract_id = "not-a-contract".into();
        assert!(matches!(cfg.validate_network(), Err(OracleError::Config(_))));
    }

    #[test]
    fn zero_poll_timeout_means_unbounded() {
        let cfg = sample();
        assert!(cfg.poll.policy().timeout.is_none());
    }

    #[test]
    fn digest_never_contains_secrets() {
        let cfg = sample();
        assert!(!cfg.digest().contains(&cfg.signer.source_secret));
        assert!(!format!("{:?}", cfg.signer).contains(&cfg.signer.source_secret));
    }
}
