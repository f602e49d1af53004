//! Price batcher: dedup, normalize and group rows by settlement asset

use std::collections::{BTreeMap, HashSet};

use crate::error::Result;
use crate::feeder::normalize::normalize_timestamp;
use crate::persistence::PriceRow;
use crate::types::{AssetType, PriceInput, SettlementAsset};

/// Prices bound for one settlement contract
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBatch {
    pub settlement: SettlementAsset,
    pub prices: Vec<PriceInput>,
    /// Pairs to flag as sent once the batch lands
    pub symbols_by_source: BTreeMap<u32, Vec<String>>,
}

impl PriceBatch {
    fn new(settlement: SettlementAsset) -> Self {
        Self {
            settlement,
            prices: Vec::new(),
            symbols_by_source: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Keep the first row of every `(source, symbol)` pair, in input order.
pub fn dedup_rows(rows: &[PriceRow]) -> Vec<&PriceRow> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert((row.source, row.symbol.clone())))
        .collect()
}

/// Build the non-empty batches, XLM first.
///
/// Every row is checked before anything is returned, so an unknown
/// settlement asset aborts the whole run.
pub fn build_batches(rows: &[PriceRow], resolution: u64) -> Result<Vec<PriceBatch>> {
    let mut batches: BTreeMap<SettlementAsset, PriceBatch> = BTreeMap::new();

    for row in dedup_rows(rows) {
        let settlement: SettlementAsset = row.sell_asset.parse()?;
        let timestamp = normalize_timestamp(row.updated_at.timestamp().max(0) as u64, resolution);

        let batch = batches
            .entry(settlement)
            .or_insert_with(|| PriceBatch::new(settlement));
        batch.prices.push(PriceInput {
            source: row.source,
            asset_type: AssetType::Other,
            asset: row.buy_asset.clone(),
            price: row.price.clone(),
            timestamp,
        });
        batch
            .symbols_by_source
            .entry(row.source)
            .or_default()
            .push(row.symbol.clone());
    }

    Ok(SettlementAsset::ALL
        .iter()
        .filter_map(|asset| batches.remove(asset))
        .collect())
}
