//! SQLite persistence for the batch feeder
//!
//! Reads unsent rows from the `prices` table, appends to the
//! `feed_bulk_from_db_logs` audit table and flags rows once they are on-chain.
//! Both tables are owned by the pricing API; this module only creates them
//! for local setups and tests.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Transaction};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{OracleError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    updated_at DATETIME NOT NULL,
    source INTEGER NOT NULL,
    symbol VARCHAR(32) NOT NULL,
    price DECIMAL NOT NULL,
    sell_asset VARCHAR(32) NOT NULL,
    buy_asset VARCHAR(32) NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'active',
    asset_type VARCHAR(16) NOT NULL DEFAULT 'other',
    added_to_blockchain BOOLEAN NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS feed_bulk_from_db_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    command TEXT NOT NULL,
    output TEXT NOT NULL,
    success BOOLEAN NOT NULL
);
";

const UNSENT_PRICES: &str = "
SELECT id, updated_at, source, symbol, price, sell_asset, buy_asset
FROM prices
WHERE status = 'active'
  AND asset_type = 'other'
  AND added_to_blockchain = 0
ORDER BY updated_at DESC
";

/// Row of the `prices` table waiting to be sent on-chain
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub id: i64,
    pub updated_at: DateTime<Utc>,
    pub source: u32,
    pub symbol: String,
    /// Decimal text as stored, whatever the column affinity made of it
    pub price: String,
    pub sell_asset: String,
    pub buy_asset: String,
}

/// Single-connection store used for one feeder run
pub struct PriceStore {
    conn: Connection,
}

impl PriceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened price database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `work` in one transaction: committed on `Ok`, rolled back on `Err`.
    pub fn with_transaction<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Active `other` rows not yet on-chain, newest first.
    pub fn read_unsent_prices(&self) -> Result<Vec<PriceRow>> {
        let mut stmt = self.conn.prepare(UNSENT_PRICES)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Value>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Value>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut prices = Vec::new();
        for row in rows {
            let (id, updated_at, source, symbol, price, sell_asset, buy_asset) = row?;
            prices.push(PriceRow {
                id,
                updated_at: parse_updated_at(id, updated_at)?,
                source: u32::try_from(source).map_err(|_| {
                    OracleError::InvalidArgument(format!("row {id}: source {source} out of range"))
                })?,
                symbol,
                price: price_text(id, price)?,
                sell_asset,
                buy_asset,
            });
        }
        Ok(prices)
    }

    /// Append one audit record.
    pub fn log_invocation(&mut self, command: &str, output: &str, success: bool) -> Result<()> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO feed_bulk_from_db_logs (command, output, success) VALUES (?1, ?2, ?3)",
                params![command, output, success],
            )?;
            Ok(())
        })
    }

    /// Flag the given symbols of each source as sent. Returns the number of rows updated.
    pub fn mark_sent(&mut self, symbols_by_source: &BTreeMap<u32, Vec<String>>) -> Result<usize> {
        self.with_transaction(|tx| {
            let mut updated = 0;
            for (source, symbols) in symbols_by_source {
                if symbols.is_empty() {
                    continue;
                }
                let placeholders = vec!["?"; symbols.len()].join(", ");
                let sql = format!(
                    "UPDATE prices SET added_to_blockchain = 1 \
                     WHERE source = ? AND symbol IN ({placeholders}) AND added_to_blockchain = 0"
                );
                let mut values: Vec<Value> = vec![Value::Integer(*source as i64)];
                values.extend(symbols.iter().map(|s| Value::Text(s.clone())));
                updated += tx.execute(&sql, params_from_iter(values))?;
            }
            Ok(updated)
        })
    }

    /// Number of audit records, mostly useful for checks.
    pub fn invocation_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM feed_bulk_from_db_logs", [], |row| row.get(0))?)
    }
}

fn parse_updated_at(id: i64, value: Value) -> Result<DateTime<Utc>> {
    let invalid = |detail: String| OracleError::InvalidArgument(format!("row {id}: updated_at {detail}"));
    match value {
        Value::Integer(secs) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| invalid(format!("{secs} out of range"))),
        Value::Text(text) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
                return Ok(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(&text, format) {
                    return Ok(Utc.from_utc_datetime(&naive));
                }
            }
            if let Ok(dt) = DateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f%:z") {
                return Ok(dt.with_timezone(&Utc));
            }
            Err(invalid(format!("'{text}' is not a timestamp")))
        }
        other => Err(invalid(format!("has unexpected type {:?}", other.data_type()))),
    }
}

fn price_text(id: i64, value: Value) -> Result<String> {
    match value {
        Value::Text(text) => Ok(text),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Real(f) => Ok(f.to_string()),
        other => Err(OracleError::InvalidArgument(format!(
            "row {id}: price has unexpected type {:?}",
            other.data_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PriceStore {
        let store = PriceStore::open_in_memory().unwrap();
        store.create_schema().unwrap();
        store
    }

    fn insert(store: &PriceStore, updated_at: &str, source: i64, symbol: &str, price: &str, sell: &str) {
        store
            .conn
            .execute(
                "INSERT INTO prices (updated_at, source, symbol, price, sell_asset, buy_asset) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![updated_at, source, symbol, price, sell, symbol.split('/').next().unwrap()],
            )
            .unwrap();
    }

    #[test]
    fn reads_only_active_unsent_other_rows_newest_first() {
        let store = store();
        insert(&store, "2024-01-01 10:00:00", 1, "BRL/USD", "0.2", "USD");
        insert(&store, "2024-01-01 11:00:00.250000", 1, "EUR/XLM", "8.5", "XLM");
        insert(&store, "2024-01-01 12:00:00", 2, "ARS/USD", "0.001", "USD");
        store
            .conn
            .execute("UPDATE prices SET status = 'inactive' WHERE symbol = 'ARS/USD'", [])
            .unwrap();
        insert(&store, "2024-01-01 13:00:00", 2, "GBP/USD", "1.25", "USD");
        store
            .conn
            .execute("UPDATE prices SET added_to_blockchain = 1 WHERE symbol = 'GBP/USD'", [])
            .unwrap();

        let rows = store.read_unsent_prices().unwrap();
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["EUR/XLM", "BRL/USD"]);
        assert_eq!(rows[0].buy_asset, "EUR");
        assert_eq!(rows[0].price, "8.5");
        assert_eq!(rows[0].updated_at.timestamp(), 1_704_106_800);
    }

    #[test]
    fn mark_sent_only_touches_listed_pairs() {
        let mut store = store();
        insert(&store, "2024-01-01 10:00:00", 1, "BRL/USD", "0.2", "USD");
        insert(&store, "2024-01-01 10:00:00", 2, "BRL/USD", "0.21", "USD");
        insert(&store, "2024-01-01 10:00:00", 1, "EUR/USD", "1.1", "USD");

        let mut pairs = BTreeMap::new();
        pairs.insert(1u32, vec!["BRL/USD".to_string()]);
        assert_eq!(store.mark_sent(&pairs).unwrap(), 1);
        // already flagged rows are not counted twice
        assert_eq!(store.mark_sent(&pairs).unwrap(), 0);

        let remaining: Vec<(u32, String)> = store
            .read_unsent_prices()
            .unwrap()
            .into_iter()
            .map(|r| (r.source, r.symbol))
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(!remaining.contains(&(1, "BRL/USD".to_string())));
    }

    #[test]
    fn failed_unit_of_work_rolls_back() {
        let mut store = store();
        let result: Result<()> = store.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO feed_bulk_from_db_logs (command, output, success) VALUES ('x', '', 0)",
                [],
            )?;
            Err(OracleError::InvalidArgument("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.invocation_count().unwrap(), 0);

        store.log_invocation("oracle add-prices-base64 W10=", "ok", true).unwrap();
        assert_eq!(store.invocation_count().unwrap(), 1);
    }

    #[test]
    fn updated_at_formats() {
        let expected = 1_704_103_200;
        for text in [
            "2024-01-01 10:00:00",
            "2024-01-01T10:00:00.123",
            "2024-01-01T10:00:00+00:00",
            "2024-01-01 12:00:00+02:00",
        ] {
            let parsed = parse_updated_at(1, Value::Text(text.into())).unwrap();
            assert_eq!(parsed.timestamp(), expected, "{text}");
        }
        assert_eq!(
            parse_updated_at(1, Value::Integer(expected)).unwrap().timestamp(),
            expected
        );
        assert!(parse_updated_at(1, Value::Text("yesterday".into())).is_err());
    }

    #[test]
    fn price_text_from_any_affinity() {
        assert_eq!(price_text(1, Value::Real(0.0123)).unwrap(), "0.0123");
        assert_eq!(price_text(1, Value::Integer(3)).unwrap(), "3");
        assert_eq!(price_text(1, Value::Text("1.00".into())).unwrap(), "1.00");
        assert!(price_text(1, Value::Null).is_err());
    }
}
