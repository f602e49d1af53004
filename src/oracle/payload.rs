//! Base64/JSON price payload
//!
//! The batch feeder hands price groups to `oracle-cli` as a single base64
//! argument wrapping a JSON array of [`PriceInput`] objects.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{OracleError, Result};
use crate::types::PriceInput;

pub fn encode_prices(prices: &[PriceInput]) -> Result<String> {
    let json = serde_json::to_vec(prices)?;
    Ok(STANDARD.encode(json))
}

pub fn decode_prices(payload: &str) -> Result<Vec<PriceInput>> {
    let bytes = STANDARD.decode(payload.trim())?;
    let prices: Vec<PriceInput> = serde_json::from_slice(&bytes)?;
    if prices.is_empty() {
        return Err(OracleError::Payload("price list is empty".into()));
    }
    Ok(prices)
}
