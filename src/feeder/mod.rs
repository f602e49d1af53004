//! Batch feeder
//!
//! One run reads the unsent prices, groups them per settlement contract and
//! submits each group through `oracle-cli`:
//! - rows are deduplicated per `(source, symbol)` and timestamps aligned to the resolution
//! - every attempt is written to the audit log
//! - rows are flagged as sent only after their group succeeded
//!
//! Nothing is retried within a run. Failed groups stay unsent and are picked
//! up again by the next run, so delivery is at-least-once.

pub mod batch;
pub mod invoker;
pub mod normalize;

pub use batch::{build_batches, PriceBatch};
pub use invoker::{CliSubprocessInvoker, Invocation, SubmissionInvoker};
pub use normalize::normalize_timestamp;

use tracing::{info, warn};

use crate::config::SettlementContracts;
use crate::error::Result;
use crate::oracle::payload::encode_prices;
use crate::persistence::PriceStore;
use crate::types::SettlementAsset;

/// What one run did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedReport {
    pub rows_read: usize,
    pub submitted: Vec<(SettlementAsset, Invocation)>,
    pub rows_marked: usize,
}

impl FeedReport {
    pub fn failures(&self) -> usize {
        self.submitted.iter().filter(|(_, inv)| !inv.success).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

pub struct Feeder<I> {
    store: PriceStore,
    invoker: I,
    contracts: SettlementContracts,
    resolution: u64,
}

impl<I: SubmissionInvoker> Feeder<I> {
    pub fn new(store: PriceStore, invoker: I, contracts: SettlementContracts, resolution: u64) -> Self {
        Self {
            store,
            invoker,
            contracts,
            resolution,
        }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    pub async fn run(&mut self) -> Result<FeedReport> {
        let rows = self.store.read_unsent_prices()?;
        let mut report = FeedReport {
            rows_read: rows.len(),
            ..FeedReport::default()
        };
        if rows.is_empty() {
            info!("no new prices to feed into the blockchain contract");
            return Ok(report);
        }

        let batches = build_batches(&rows, self.resolution)?;
        for batch in batches {
            let contract_id = self.contracts.contract_for(batch.settlement);
            let payload = encode_prices(&batch.prices)?;

            let invocation = self.invoker.add_prices(contract_id, &payload).await?;
            info!(
                settlement = %batch.settlement,
                prices = batch.len(),
                "oracle-cli {}",
                invocation.command
            );
            info!("{}", invocation.output);
            self.store
                .log_invocation(&invocation.command, &invocation.output, invocation.success)?;

            if invocation.success {
                report.rows_marked += self.store.mark_sent(&batch.symbols_by_source)?;
            } else {
                warn!(
                    settlement = %batch.settlement,
                    contract_id,
                    "submission failed, prices stay unsent"
                );
            }
            report.submitted.push((batch.settlement, invocation));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;
    use crate::feeder::invoker::MockSubmissionInvoker;
    use crate::oracle::payload::decode_prices;

    fn contracts() -> SettlementContracts {
        SettlementContracts {
            xlm: "CXLM".into(),
            usd: "CUSD".into(),
        }
    }

    fn store_with(rows: &[(&str, i64, &str, &str, &str)]) -> PriceStore {
        let mut store = PriceStore::open_in_memory().unwrap();
        store.create_schema().unwrap();
        store
            .with_transaction(|tx| {
                for (updated_at, source, symbol, price, sell) in rows {
                    let buy = symbol.split('/').next().unwrap_or_default();
                    tx.execute(
                        "INSERT INTO prices (updated_at, source, symbol, price, sell_asset, buy_asset) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        rusqlite::params![updated_at, source, symbol, price, sell, buy],
                    )?;
                }
                Ok(())
            })
            .unwrap();
        store
    }

    fn ok(command: &str) -> Invocation {
        Invocation {
            command: command.to_string(),
            success: true,
            output: "Success!".into(),
        }
    }

    #[tokio::test]
    async fn nothing_to_send_makes_no_calls() {
        let store = store_with(&[]);
        let mut invoker = MockSubmissionInvoker::new();
        invoker.expect_add_prices().never();

        let report = Feeder::new(store, invoker, contracts(), 600).run().await.unwrap();
        assert_eq!(report.rows_read, 0);
        assert!(report.submitted.is_empty());
    }

    #[tokio::test]
    async fn each_group_goes_to_its_contract() {
        let store = store_with(&[
            ("2024-01-01 10:00:01", 1, "BRL/USD", "0.2", "USD"),
            ("2024-01-01 10:00:01", 1, "EUR/XLM", "8.5", "XLM"),
        ]);
        let mut invoker = MockSubmissionInvoker::new();
        invoker
            .expect_add_prices()
            .withf(|contract, _| contract == "CXLM")
            .times(1)
            .returning(|_, payload| {
                let prices = decode_prices(payload).unwrap();
                assert_eq!(prices.len(), 1);
                assert_eq!(prices[0].asset, "EUR");
                assert_eq!(prices[0].timestamp % 600, 0);
                Ok(ok("xlm"))
            });
        invoker
            .expect_add_prices()
            .withf(|contract, _| contract == "CUSD")
            .times(1)
            .returning(|_, _| Ok(ok("usd")));

        let mut feeder = Feeder::new(store, invoker, contracts(), 600);
        let report = feeder.run().await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.rows_marked, 2);
        assert_eq!(feeder.store().invocation_count().unwrap(), 2);
        assert!(feeder.store().read_unsent_prices().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_group_stays_unsent() {
        let store = store_with(&[
            ("2024-01-01 10:00:01", 1, "BRL/USD", "0.2", "USD"),
            ("2024-01-01 10:00:01", 1, "EUR/XLM", "8.5", "XLM"),
        ]);
        let mut invoker = MockSubmissionInvoker::new();
        invoker.expect_add_prices().returning(|contract, _| {
            Ok(Invocation {
                command: contract.to_string(),
                success: contract == "CXLM",
                output: String::new(),
            })
        });

        let mut feeder = Feeder::new(store, invoker, contracts(), 600);
        let report = feeder.run().await.unwrap();
        assert_eq!(report.failures(), 1);
        assert_eq!(report.rows_marked, 1);
        assert_eq!(feeder.store().invocation_count().unwrap(), 2);

        let left = feeder.store().read_unsent_prices().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].symbol, "BRL/USD");
    }

    #[tokio::test]
    async fn unknown_settlement_aborts_before_submitting() {
        let store = store_with(&[
            ("2024-01-01 10:00:01", 1, "BRL/USD", "0.2", "USD"),
            ("2024-01-01 10:00:01", 1, "JPY/EUR", "160", "EUR"),
        ]);
        let mut invoker = MockSubmissionInvoker::new();
        invoker.expect_add_prices().never();

        let mut feeder = Feeder::new(store, invoker, contracts(), 600);
        let err = feeder.run().await.unwrap_err();
        assert!(matches!(err, OracleError::UnrecognizedSettlementAsset(_)));
        assert_eq!(feeder.store().invocation_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn mocked_invoker_receives_normalized_payload() {
        let store = store_with(&[("2024-01-01 10:00:01", 3, "ARS/USD", "0.001", "USD")]);
        let mut invoker = MockSubmissionInvoker::new();
        invoker
            .expect_add_prices()
            .withf(|contract, payload| {
                let prices = decode_prices(payload).unwrap();
                contract == "CUSD" && prices[0].source == 3 && prices[0].timestamp == 1_704_103_800
            })
            .times(1)
            .returning(|_, _| Ok(ok("usd")));

        let report = Feeder::new(store, invoker, contracts(), 600).run().await.unwrap();
        assert_eq!(report.rows_read, 1);
        assert_eq!(report.rows_marked, 1);
    }
}
