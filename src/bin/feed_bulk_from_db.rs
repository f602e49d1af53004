//! Batch feeder
//!
//! Usage: feed-bulk-from-db
//!
//! Sends the unsent prices of the local database to the XLM and USD oracle
//! contracts, one `oracle-cli` call per settlement asset.

use anyhow::Context;
use std::process::ExitCode;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use sep40_oracle::config::AppConfig;
use sep40_oracle::feeder::{CliSubprocessInvoker, Feeder};
use sep40_oracle::persistence::PriceStore;

fn main() -> ExitCode {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every submission succeeded.
fn run() -> anyhow::Result<bool> {
    let config = AppConfig::load()?;
    config.validate_feeder()?;

    let store = PriceStore::open(&config.feeder.db_path)
        .with_context(|| format!("failed to open {}", config.feeder.db_path))?;
    let invoker = CliSubprocessInvoker::from_config(&config.feeder.cli_path)?;
    info!(
        db = %config.feeder.db_path,
        cli = %invoker.program().display(),
        resolution = config.feeder.resolution,
        "feeding prices"
    );

    let mut feeder = Feeder::new(
        store,
        invoker,
        config.feeder.contracts.clone(),
        config.feeder.resolution,
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(feeder.run())?;

    info!(
        rows = report.rows_read,
        batches = report.submitted.len(),
        failed = report.failures(),
        marked = report.rows_marked,
        "feed finished"
    );
    Ok(report.is_success())
}
