//! `oracle-cli` command tree
//!
//! Two namespaces: `oracle` for contract entry points and `rpc` for raw
//! JSON-RPC passthrough. Subcommands are kebab-case; the snake_case names
//! are accepted as aliases.

mod session;

pub use session::{render_contract_output, run, Heartbeat, Session};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::{AssetType, OracleAsset};

#[derive(Debug, Parser)]
#[command(name = "oracle-cli", version, about = "Client for the SEP-40 price oracle contract", long_about = None)]
pub struct Cli {
    /// Print debug output (prepared transactions, RPC responses).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Target this oracle contract instead of the configured one.
    #[arg(long, global = true)]
    pub oracle_contract_id: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Invoke oracle contract entry points.
    #[command(subcommand)]
    Oracle(OracleCommand),
    /// Raw RPC requests.
    #[command(subcommand)]
    Rpc(RpcCommand),
}

#[derive(Debug, Subcommand)]
pub enum OracleCommand {
    /// oracle: invoke initialize()
    Initialize {
        admin: String,
        /// Symbol of the base asset
        base: String,
        decimals: u32,
        resolution: u32,
    },
    /// oracle: invoke bump_instance()
    #[command(alias = "bump_instance")]
    BumpInstance {
        /// Number of ledgers to live
        #[arg(long)]
        ledgers_to_live: u32,
    },
    /// oracle: invoke read_admin()
    #[command(alias = "read_admin")]
    ReadAdmin,
    /// oracle: invoke write_resolution()
    #[command(alias = "write_resolution")]
    WriteResolution { resolution: u32 },
    /// oracle: invoke sources()
    Sources,
    /// oracle: invoke prices_by_source()
    #[command(alias = "prices_by_source")]
    PricesBySource {
        source: u32,
        #[arg(value_enum)]
        asset_type: AssetType,
        asset: String,
        records: u32,
    },
    /// oracle: invoke price_by_source()
    #[command(alias = "price_by_source")]
    PriceBySource {
        source: u32,
        #[arg(value_enum)]
        asset_type: AssetType,
        asset: String,
        timestamp: u64,
    },
    /// oracle: invoke lastprice_by_source()
    #[command(alias = "lastprice_by_source")]
    LastpriceBySource {
        source: u32,
        #[arg(value_enum)]
        asset_type: AssetType,
        asset: String,
    },
    /// oracle: invoke add_prices() with a single price
    #[command(alias = "add_price")]
    AddPrice {
        #[arg(long)]
        source: u32,
        #[arg(long, value_enum)]
        asset_type: AssetType,
        #[arg(long)]
        asset: String,
        #[arg(long)]
        price: String,
        #[arg(long)]
        timestamp: u64,
    },
    /// oracle: invoke add_prices() with a base64 payload
    #[command(
        name = "add-prices-base64",
        aliases = ["add_prices_base64", "add-prices-from-base64-json"]
    )]
    AddPricesBase64 {
        /// A base64-encoded JSON list of prices. Each item must look like
        /// {"source": 0, "asset_type": "other", "asset": "USD", "price": "1.00", "timestamp": 12345678}
        prices_base64: String,
    },
    /// oracle: invoke base()
    Base,
    /// oracle: invoke assets()
    Assets,
    /// oracle: invoke decimals()
    Decimals,
    /// oracle: invoke resolution()
    Resolution,
    /// oracle: invoke price()
    Price {
        #[arg(value_enum)]
        asset_type: AssetType,
        asset: String,
        timestamp: u64,
    },
    /// oracle: invoke prices()
    Prices {
        #[arg(value_enum)]
        asset_type: AssetType,
        asset: String,
        records: u32,
    },
    /// oracle: invoke lastprice()
    Lastprice {
        #[arg(value_enum)]
        asset_type: AssetType,
        asset: String,
    },
    /// oracle: upload new code and invoke update_contract()
    #[command(aliases = ["update_contract", "upload-new-contract-code"])]
    UpdateContract {
        /// Path to WASM file
        wasm_file: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum RpcCommand {
    /// invoke RPC getLatestLedger()
    #[command(alias = "get_latest_ledger")]
    GetLatestLedger,
    /// invoke RPC getEvents() for the oracle contract
    #[command(alias = "get_events")]
    GetEvents {
        start_ledger: u32,
        #[arg(long, default_value_t = 2)]
        pagination_limit: u32,
    },
}

fn asset(asset_type: AssetType, asset: &str) -> OracleAsset {
    OracleAsset::new(asset_type, asset)
}

/// Log filter directives. `RUST_LOG` wins; `-v` only raises this crate to debug.
pub fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ if verbose => "info,sep40_oracle=debug".to_string(),
        _ => "info".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("oracle-cli").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn verbose_only_raises_own_crate() {
        assert_eq!(log_directives(true, None), "info,sep40_oracle=debug");
        assert_eq!(log_directives(false, None), "info");
        assert_eq!(log_directives(true, Some("warn".into())), "warn");
        assert_eq!(log_directives(false, Some(" ".into())), "info");
    }

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["oracle", "decimals", "-v", "--oracle-contract-id", "CABC"]);
        assert!(cli.verbose);
        assert_eq!(cli.oracle_contract_id.as_deref(), Some("CABC"));
        assert!(matches!(cli.command, Command::Oracle(OracleCommand::Decimals)));
    }

    #[test]
    fn snake_case_aliases() {
        let cli = parse(&["oracle", "bump_instance", "--ledgers-to-live", "1000"]);
        assert!(matches!(
            cli.command,
            Command::Oracle(OracleCommand::BumpInstance { ledgers_to_live: 1000 })
        ));

        let cli = parse(&["oracle", "add_prices_base64", "W10="]);
        assert!(matches!(
            cli.command,
            Command::Oracle(OracleCommand::AddPricesBase64 { .. })
        ));

        let cli = parse(&["rpc", "get_latest_ledger"]);
        assert!(matches!(cli.command, Command::Rpc(RpcCommand::GetLatestLedger)));
    }

    #[test]
    fn positional_asset_arguments() {
        let cli = parse(&["oracle", "prices-by-source", "3", "other", "EUR", "5"]);
        let Command::Oracle(OracleCommand::PricesBySource {
            source,
            asset_type,
            asset,
            records,
        }) = cli.command
        else {
            panic!("unexpected command");
        };
        assert_eq!((source, asset_type, asset.as_str(), records), (3, AssetType::Other, "EUR", 5));

        assert!(Cli::try_parse_from(["oracle-cli", "oracle", "lastprice", "fiat", "EUR"]).is_err());
    }

    #[test]
    fn add_price_takes_named_options() {
        let cli = parse(&[
            "oracle",
            "add-price",
            "--source",
            "0",
            "--asset-type",
            "other",
            "--asset",
            "USD",
            "--price",
            "1.00",
            "--timestamp",
            "12345678",
        ]);
        let Command::Oracle(OracleCommand::AddPrice { price, timestamp, .. }) = cli.command else {
            panic!("unexpected command");
        };
        assert_eq!(price, "1.00");
        assert_eq!(timestamp, 12345678);
    }

    #[test]
    fn get_events_default_limit() {
        let cli = parse(&["rpc", "get-events", "1234"]);
        assert!(matches!(
            cli.command,
            Command::Rpc(RpcCommand::GetEvents {
                start_ledger: 1234,
                pagination_limit: 2
            })
        ));
    }
}
