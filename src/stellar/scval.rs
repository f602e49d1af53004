//! Contract argument encoding and return value decoding
//!
//! Arguments are built from Rust values into `ScVal`s following the contract
//! calling convention (enum variants as `[Symbol(tag), payload...]`, structs
//! as maps with sorted symbol keys). Return values are decoded into the
//! tagged `ContractValue` for printing.

use rust_decimal::Decimal;
use std::fmt;
use stellar_xdr::curr::{
    Hash, Int128Parts, ScBytes, ScMap, ScMapEntry, ScSymbol, ScVal, ScVec, StringM,
    UInt128Parts,
};

use crate::error::{OracleError, Result};
use crate::stellar::keys::{address_to_string, parse_address};
use crate::types::OracleAsset;

pub fn symbol(name: &str) -> Result<ScVal> {
    Ok(ScVal::Symbol(ScSymbol(StringM::try_from(name).map_err(
        |_| OracleError::InvalidArgument(format!("not a valid contract symbol: {name}")),
    )?)))
}

pub fn u32_val(value: u32) -> ScVal {
    ScVal::U32(value)
}

pub fn u64_val(value: u64) -> ScVal {
    ScVal::U64(value)
}

pub fn i128_val(value: i128) -> ScVal {
    ScVal::I128(Int128Parts {
        hi: (value >> 64) as i64,
        lo: value as u64,
    })
}

pub fn address(strkey: &str) -> Result<ScVal> {
    Ok(ScVal::Address(parse_address(strkey)?))
}

pub fn bytes(data: Vec<u8>) -> Result<ScVal> {
    Ok(ScVal::Bytes(ScBytes(data.try_into()?)))
}

pub fn hash_bytes(hash: &Hash) -> Result<ScVal> {
    bytes(hash.0.to_vec())
}

pub fn vec(items: Vec<ScVal>) -> Result<ScVal> {
    Ok(ScVal::Vec(Some(ScVec(items.try_into()?))))
}

/// Encode a contract struct. Keys are sorted, as the host requires.
pub fn struct_map(mut fields: Vec<(&str, ScVal)>) -> Result<ScVal> {
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let entries = fields
        .into_iter()
        .map(|(key, val)| Ok(ScMapEntry { key: symbol(key)?, val }))
        .collect::<Result<Vec<_>>>()?;
    Ok(ScVal::Map(Some(ScMap(entries.try_into()?))))
}

/// Encode a contract enum variant carrying one value.
pub fn enum_variant(tag: &str, payload: ScVal) -> Result<ScVal> {
    vec(vec![symbol(tag)?, payload])
}

pub fn asset(asset: &OracleAsset) -> Result<ScVal> {
    let payload = match asset {
        OracleAsset::Stellar(addr) => address(addr)?,
        OracleAsset::Other(sym) => symbol(sym)?,
    };
    enum_variant(asset.tag(), payload)
}

/// Scale a decimal price string into the contract's fixed-point integer.
pub fn scale_price(price: &str, decimals: u32) -> Result<i128> {
    let parsed: Decimal = price
        .trim()
        .parse()
        .map_err(|e| OracleError::InvalidArgument(format!("invalid price '{price}': {e}")))?;
    let normalized = parsed.normalize();
    if normalized.scale() > decimals {
        return Err(OracleError::InvalidArgument(format!(
            "price '{price}' has more than {decimals} decimal places"
        )));
    }
    let mantissa = normalized.mantissa();
    let factor = 10i128
        .checked_pow(decimals - normalized.scale())
        .ok_or_else(|| OracleError::InvalidArgument(format!("decimals {decimals} too large")))?;
    mantissa
        .checked_mul(factor)
        .ok_or_else(|| OracleError::InvalidArgument(format!("price '{price}' overflows i128")))
}

/// Decoded contract return value
#[derive(Debug, Clone, PartialEq)]
pub enum ContractValue {
    Void,
    Bool(bool),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    U128(u128),
    I128(i128),
    Symbol(String),
    String(String),
    Bytes(Vec<u8>),
    Address(String),
    Vec(Vec<ContractValue>),
    Map(Vec<(ContractValue, ContractValue)>),
    /// Anything this client does not know how to render
    Unsupported(&'static str),
}

impl From<&ScVal> for ContractValue {
    fn from(val: &ScVal) -> Self {
        match val {
            ScVal::Void => ContractValue::Void,
            ScVal::Bool(b) => ContractValue::Bool(*b),
            ScVal::U32(v) => ContractValue::U32(*v),
            ScVal::I32(v) => ContractValue::I32(*v),
            ScVal::U64(v) => ContractValue::U64(*v),
            ScVal::I64(v) => ContractValue::I64(*v),
            ScVal::Timepoint(t) => ContractValue::U64(t.0),
            ScVal::Duration(d) => ContractValue::U64(d.0),
            ScVal::U128(UInt128Parts { hi, lo }) => {
                ContractValue::U128(((*hi as u128) << 64) | *lo as u128)
            }
            ScVal::I128(Int128Parts { hi, lo }) => {
                ContractValue::I128(((*hi as i128) << 64) | *lo as i128)
            }
            ScVal::Symbol(s) => ContractValue::Symbol(s.0.to_utf8_string_lossy()),
            ScVal::String(s) => ContractValue::String(s.0.to_utf8_string_lossy()),
            ScVal::Bytes(b) => ContractValue::Bytes(b.0.to_vec()),
            ScVal::Address(a) => ContractValue::Address(address_to_string(a)),
            ScVal::Vec(Some(items)) => {
                ContractValue::Vec(items.0.iter().map(ContractValue::from).collect())
            }
            ScVal::Vec(None) => ContractValue::Vec(Vec::new()),
            ScVal::Map(Some(map)) => ContractValue::Map(
                map.0
                    .iter()
                    .map(|e| (ContractValue::from(&e.key), ContractValue::from(&e.val)))
                    .collect(),
            ),
            ScVal::Map(None) => ContractValue::Map(Vec::new()),
            ScVal::Error(_) => ContractValue::Unsupported("error"),
            ScVal::U256(_) => ContractValue::Unsupported("u256"),
            ScVal::I256(_) => ContractValue::Unsupported("i256"),
            ScVal::LedgerKeyContractInstance => {
                ContractValue::Unsupported("ledger_key_contract_instance")
            }
            ScVal::LedgerKeyNonce(_) => ContractValue::Unsupported("ledger_key_nonce"),
            ScVal::ContractInstance(_) => ContractValue::Unsupported("contract_instance"),
        }
    }
}

impl fmt::Display for ContractValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractValue::Void => write!(f, "<void>"),
            ContractValue::Bool(b) => write!(f, "{b}"),
            ContractValue::U32(v) => write!(f, "{v}"),
            ContractValue::I32(v) => write!(f, "{v}"),
            ContractValue::U64(v) => write!(f, "{v}"),
            ContractValue::I64(v) => write!(f, "{v}"),
            ContractValue::U128(v) => write!(f, "{v}"),
            ContractValue::I128(v) => write!(f, "{v}"),
            ContractValue::Symbol(s) => write!(f, "{s}"),
            ContractValue::String(s) => write!(f, "{s:?}"),
            ContractValue::Bytes(b) => write!(f, "{}", hex::encode(b)),
            ContractValue::Address(a) => write!(f, "{a}"),
            ContractValue::Vec(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            ContractValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, val)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {val}")?;
                }
                write!(f, "}}")
            }
            ContractValue::Unsupported(kind) => write!(f, "Unexpected result type: {kind}"),
        }
    }
}
