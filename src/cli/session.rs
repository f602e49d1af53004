//! Command dispatch against an explicitly built session

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, warn};

use super::{asset, Cli, Command, OracleCommand, RpcCommand};
use crate::config::AppConfig;
use crate::oracle::payload::decode_prices;
use crate::oracle::OracleClient;
use crate::stellar::rpc::{events_request, latest_ledger_request};
use crate::stellar::{InvocationOutcome, Keypair, RpcClient, SorobanInvoker};
use crate::types::PriceInput;

/// Everything an oracle command needs, built once from the configuration
pub struct Session {
    config: AppConfig,
    oracle: OracleClient,
    http: reqwest::Client,
}

impl Session {
    pub fn new(config: AppConfig) -> Result<Self> {
        let rpc = RpcClient::new(&config.network.rpc_url)?;
        let source = Keypair::from_secret(&config.signer.source_secret)
            .context("invalid source secret")?;
        let admin =
            Keypair::from_secret(&config.signer.admin_secret).context("invalid admin secret")?;

        let invoker = |signer: Keypair| {
            SorobanInvoker::new(
                rpc.clone(),
                signer,
                &config.network.network_passphrase,
                config.transaction.base_fee,
                Duration::from_secs(config.transaction.timeout_secs),
                config.poll.policy(),
            )
        };
        let oracle = OracleClient::new(
            &config.oracle.contract_id,
            invoker(source),
            invoker(admin),
            config.oracle.decimals,
        )?;

        Ok(Self {
            config,
            oracle,
            http: reqwest::Client::new(),
        })
    }

    pub async fn execute(&self, command: OracleCommand) -> Result<InvocationOutcome> {
        let oracle = &self.oracle;
        let outcome = match command {
            OracleCommand::Initialize {
                admin,
                base,
                decimals,
                resolution,
            } => oracle.initialize(&admin, &base, decimals, resolution).await?,
            OracleCommand::BumpInstance { ledgers_to_live } => {
                oracle.bump_instance(ledgers_to_live).await?
            }
            OracleCommand::ReadAdmin => oracle.read_admin().await?,
            OracleCommand::WriteResolution { resolution } => {
                oracle.write_resolution(resolution).await?
            }
            OracleCommand::Sources => oracle.sources().await?,
            OracleCommand::PricesBySource {
                source,
                asset_type,
                asset: a,
                records,
            } => {
                oracle
                    .prices_by_source(source, asset(asset_type, &a), records)
                    .await?
            }
            OracleCommand::PriceBySource {
                source,
                asset_type,
                asset: a,
                timestamp,
            } => {
                oracle
                    .price_by_source(source, asset(asset_type, &a), timestamp)
                    .await?
            }
            OracleCommand::LastpriceBySource {
                source,
                asset_type,
                asset: a,
            } => {
                oracle
                    .lastprice_by_source(source, asset(asset_type, &a))
                    .await?
            }
            OracleCommand::AddPrice {
                source,
                asset_type,
                asset: a,
                price,
                timestamp,
            } => {
                oracle
                    .add_prices(vec![PriceInput {
                        source,
                        asset_type,
                        asset: a,
                        price,
                        timestamp,
                    }])
                    .await?
            }
            OracleCommand::AddPricesBase64 { prices_base64 } => {
                let prices = decode_prices(&prices_base64).context("invalid prices payload")?;
                oracle.add_prices(prices).await?
            }
            OracleCommand::Base => oracle.base().await?,
            OracleCommand::Assets => oracle.assets().await?,
            OracleCommand::Decimals => oracle.decimals().await?,
            OracleCommand::Resolution => oracle.resolution().await?,
            OracleCommand::Price {
                asset_type,
                asset: a,
                timestamp,
            } => oracle.price(asset(asset_type, &a), timestamp).await?,
            OracleCommand::Prices {
                asset_type,
                asset: a,
                records,
            } => oracle.prices(asset(asset_type, &a), records).await?,
            OracleCommand::Lastprice { asset_type, asset: a } => {
                oracle.lastprice(asset(asset_type, &a)).await?
            }
            OracleCommand::UpdateContract { wasm_file } => {
                let wasm = tokio::fs::read(&wasm_file)
                    .await
                    .with_context(|| format!("failed to read {}", wasm_file.display()))?;
                oracle.update_contract(wasm).await?
            }
        };
        Ok(outcome)
    }

    /// Signal a successful manual price submission. Never fails the command.
    pub async fn ping_heartbeat(&self) -> Heartbeat {
        let Some(url) = self
            .config
            .oracle
            .add_prices_success_heartbeat_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
        else {
            eprintln!("No ADD_PRICES_SUCCESS_HEARTBEAT_URL set");
            return Heartbeat::NotConfigured;
        };
        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(url, "heartbeat sent");
                Heartbeat::Sent
            }
            Ok(resp) => {
                warn!(url, status = %resp.status(), "heartbeat rejected");
                Heartbeat::Rejected(resp.status().as_u16())
            }
            Err(e) => {
                warn!(url, error = %e, "heartbeat failed");
                Heartbeat::Unreachable
            }
        }
    }
}

/// Result of the post-submission heartbeat ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    NotConfigured,
    Sent,
    Rejected(u16),
    Unreachable,
}

/// Text printed after a successful contract call.
pub fn render_contract_output(horizon_url: &str, outcome: &InvocationOutcome) -> String {
    format!(
        "Output:\n{}\nHorizon tx:\n{}/transactions/{}\n\nSuccess!\n",
        outcome.decoded(),
        horizon_url.trim_end_matches('/'),
        outcome.hash
    )
}

async fn passthrough(config: &AppConfig, command: RpcCommand) -> Result<()> {
    let rpc = RpcClient::new(&config.network.rpc_url)?;
    let payload = match command {
        RpcCommand::GetLatestLedger => latest_ledger_request(),
        RpcCommand::GetEvents {
            start_ledger,
            pagination_limit,
        } => events_request(start_ledger, &config.oracle.contract_id, pagination_limit),
    };
    let body = rpc.raw(&payload).await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Run one parsed command line against the loaded configuration.
pub async fn run(cli: Cli, mut config: AppConfig) -> Result<()> {
    if let Some(contract_id) = cli.oracle_contract_id {
        config.oracle.contract_id = contract_id;
    }
    debug!(config = %config, "configuration loaded");

    match cli.command {
        Command::Rpc(command) => {
            config.validate_network()?;
            passthrough(&config, command).await
        }
        Command::Oracle(command) => {
            config.validate_cli()?;
            let horizon_url = config.network.horizon_url.clone();
            let heartbeat = matches!(command, OracleCommand::AddPrice { .. });
            let session = Session::new(config)?;
            let outcome = session.execute(command).await?;
            print!("{}", render_contract_output(&horizon_url, &outcome));
            if heartbeat {
                let status = session.ping_heartbeat().await;
                debug!(?status, "heartbeat");
            }
            Ok(())
        }
    }
}
