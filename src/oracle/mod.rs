//! Oracle module - typed client for the price oracle contract
//!
//! Every contract entry point maps to one [`OracleCall`], which knows its
//! function name, its encoded arguments and which account signs it.
//! [`OracleClient`] turns calls into host functions and runs them through
//! the matching [`SorobanInvoker`].

pub mod payload;

use sha2::{Digest, Sha256};
use stellar_xdr::curr::{
    ContractId, Hash, HostFunction, InvokeContractArgs, ScAddress, ScSymbol, ScVal, StringM,
};
use tracing::{debug, info};

use crate::error::{OracleError, Result};
use crate::stellar::keys::parse_contract_id;
use crate::stellar::scval;
use crate::stellar::{InvocationOutcome, SorobanInvoker};
use crate::types::{OracleAsset, PriceInput};

/// Which configured account signs a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerRole {
    Source,
    Admin,
}

/// One invocation of an oracle entry point
#[derive(Debug, Clone, PartialEq)]
pub enum OracleCall {
    Initialize {
        admin: String,
        /// Symbol of the base asset, always tagged `Other`
        base: String,
        decimals: u32,
        resolution: u32,
    },
    BumpInstance {
        ledgers_to_live: u32,
    },
    ReadAdmin,
    WriteResolution {
        resolution: u32,
    },
    Sources,
    PricesBySource {
        source: u32,
        asset: OracleAsset,
        records: u32,
    },
    PriceBySource {
        source: u32,
        asset: OracleAsset,
        timestamp: u64,
    },
    LastPriceBySource {
        source: u32,
        asset: OracleAsset,
    },
    AddPrices {
        prices: Vec<PriceInput>,
    },
    Base,
    Assets,
    Decimals,
    Resolution,
    Price {
        asset: OracleAsset,
        timestamp: u64,
    },
    Prices {
        asset: OracleAsset,
        records: u32,
    },
    LastPrice {
        asset: OracleAsset,
    },
    UpdateContract {
        wasm_hash: Hash,
    },
}

impl OracleCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            OracleCall::Initialize { .. } => "initialize",
            OracleCall::BumpInstance { .. } => "bump_instance",
            OracleCall::ReadAdmin => "read_admin",
            OracleCall::WriteResolution { .. } => "write_resolution",
            OracleCall::Sources => "sources",
            OracleCall::PricesBySource { .. } => "prices_by_source",
            OracleCall::PriceBySource { .. } => "price_by_source",
            OracleCall::LastPriceBySource { .. } => "lastprice_by_source",
            OracleCall::AddPrices { .. } => "add_prices",
            OracleCall::Base => "base",
            OracleCall::Assets => "assets",
            OracleCall::Decimals => "decimals",
            OracleCall::Resolution => "resolution",
            OracleCall::Price { .. } => "price",
            OracleCall::Prices { .. } => "prices",
            OracleCall::LastPrice { .. } => "lastprice",
            OracleCall::UpdateContract { .. } => "update_contract",
        }
    }

    pub fn signer(&self) -> SignerRole {
        match self {
            OracleCall::WriteResolution { .. }
            | OracleCall::AddPrices { .. }
            | OracleCall::UpdateContract { .. } => SignerRole::Admin,
            _ => SignerRole::Source,
        }
    }

    /// Encode the arguments. `price_decimals` scales decimal price strings.
    pub fn args(&self, price_decimals: u32) -> Result<Vec<ScVal>> {
        let args = match self {
            OracleCall::Initialize {
                admin,
                base,
                decimals,
                resolution,
            } => vec![
                scval::address(admin)?,
                scval::asset(&OracleAsset::Other(base.clone()))?,
                scval::u32_val(*decimals),
                scval::u32_val(*resolution),
            ],
            OracleCall::BumpInstance { ledgers_to_live } => vec![scval::u32_val(*ledgers_to_live)],
            OracleCall::WriteResolution { resolution } => vec![scval::u32_val(*resolution)],
            OracleCall::PricesBySource {
                source,
                asset,
                records,
            } => vec![
                scval::u32_val(*source),
                scval::asset(asset)?,
                scval::u32_val(*records),
            ],
            OracleCall::PriceBySource {
                source,
                asset,
                timestamp,
            } => vec![
                scval::u32_val(*source),
                scval::asset(asset)?,
                scval::u64_val(*timestamp),
            ],
            OracleCall::LastPriceBySource { source, asset } => {
                vec![scval::u32_val(*source), scval::asset(asset)?]
            }
            OracleCall::AddPrices { prices } => {
                let items = prices
                    .iter()
                    .map(|price| price_struct(price, price_decimals))
                    .collect::<Result<Vec<_>>>()?;
                vec![scval::vec(items)?]
            }
            OracleCall::Price { asset, timestamp } => {
                vec![scval::asset(asset)?, scval::u64_val(*timestamp)]
            }
            OracleCall::Prices { asset, records } => {
                vec![scval::asset(asset)?, scval::u32_val(*records)]
            }
            OracleCall::LastPrice { asset } => vec![scval::asset(asset)?],
            OracleCall::UpdateContract { wasm_hash } => vec![scval::hash_bytes(wasm_hash)?],
            OracleCall::ReadAdmin
            | OracleCall::Sources
            | OracleCall::Base
            | OracleCall::Assets
            | OracleCall::Decimals
            | OracleCall::Resolution => Vec::new(),
        };
        Ok(args)
    }
}

fn price_struct(price: &PriceInput, decimals: u32) -> Result<ScVal> {
    scval::struct_map(vec![
        ("asset", scval::asset(&price.oracle_asset())?),
        ("price", scval::i128_val(scval::scale_price(&price.price, decimals)?)),
        ("source", scval::u32_val(price.source)),
        ("timestamp", scval::u64_val(price.timestamp)),
    ])
}

/// Client facade for one deployed oracle contract
#[derive(Debug, Clone)]
pub struct OracleClient {
    contract_id: String,
    contract: ContractId,
    source: SorobanInvoker,
    admin: SorobanInvoker,
    price_decimals: u32,
}

impl OracleClient {
    pub fn new(
        contract_id: &str,
        source: SorobanInvoker,
        admin: SorobanInvoker,
        price_decimals: u32,
    ) -> Result<Self> {
        Ok(Self {
            contract_id: contract_id.to_string(),
            contract: parse_contract_id(contract_id)?,
            source,
            admin,
            price_decimals,
        })
    }

    pub fn contract_id(&self) -> &str {
        &self.contract_id
    }

    pub fn host_function(&self, call: &OracleCall) -> Result<HostFunction> {
        let function_name = StringM::try_from(call.function_name()).map_err(|_| {
            OracleError::InvalidArgument(format!("bad function name {}", call.function_name()))
        })?;
        Ok(HostFunction::InvokeContract(InvokeContractArgs {
            contract_address: ScAddress::Contract(self.contract.clone()),
            function_name: ScSymbol(function_name),
            args: call.args(self.price_decimals)?.try_into()?,
        }))
    }

    fn invoker(&self, role: SignerRole) -> &SorobanInvoker {
        match role {
            SignerRole::Source => &self.source,
            SignerRole::Admin => &self.admin,
        }
    }

    pub async fn call(&self, call: &OracleCall) -> Result<InvocationOutcome> {
        let host_function = self.host_function(call)?;
        let invoker = self.invoker(call.signer());
        debug!(
            contract_id = %self.contract_id,
            function = call.function_name(),
            signer = %invoker.signer().public_key(),
            "invoking contract"
        );
        invoker.invoke(host_function).await
    }

    pub async fn initialize(
        &self,
        admin: &str,
        base: &str,
        decimals: u32,
        resolution: u32,
    ) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Initialize {
            admin: admin.to_string(),
            base: base.to_string(),
            decimals,
            resolution,
        })
        .await
    }

    pub async fn bump_instance(&self, ledgers_to_live: u32) -> Result<InvocationOutcome> {
        self.call(&OracleCall::BumpInstance { ledgers_to_live }).await
    }

    pub async fn read_admin(&self) -> Result<InvocationOutcome> {
        self.call(&OracleCall::ReadAdmin).await
    }

    pub async fn write_resolution(&self, resolution: u32) -> Result<InvocationOutcome> {
        self.call(&OracleCall::WriteResolution { resolution }).await
    }

    pub async fn sources(&self) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Sources).await
    }

    pub async fn prices_by_source(
        &self,
        source: u32,
        asset: OracleAsset,
        records: u32,
    ) -> Result<InvocationOutcome> {
        self.call(&OracleCall::PricesBySource {
            source,
            asset,
            records,
        })
        .await
    }

    pub async fn price_by_source(
        &self,
        source: u32,
        asset: OracleAsset,
        timestamp: u64,
    ) -> Result<InvocationOutcome> {
        self.call(&OracleCall::PriceBySource {
            source,
            asset,
            timestamp,
        })
        .await
    }

    pub async fn lastprice_by_source(
        &self,
        source: u32,
        asset: OracleAsset,
    ) -> Result<InvocationOutcome> {
        self.call(&OracleCall::LastPriceBySource { source, asset })
            .await
    }

    pub async fn add_prices(&self, prices: Vec<PriceInput>) -> Result<InvocationOutcome> {
        if prices.is_empty() {
            return Err(OracleError::InvalidArgument("no prices to add".into()));
        }
        info!(contract_id = %self.contract_id, count = prices.len(), "adding prices");
        self.call(&OracleCall::AddPrices { prices }).await
    }

    pub async fn base(&self) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Base).await
    }

    pub async fn assets(&self) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Assets).await
    }

    pub async fn decimals(&self) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Decimals).await
    }

    pub async fn resolution(&self) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Resolution).await
    }

    pub async fn price(&self, asset: OracleAsset, timestamp: u64) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Price { asset, timestamp }).await
    }

    pub async fn prices(&self, asset: OracleAsset, records: u32) -> Result<InvocationOutcome> {
        self.call(&OracleCall::Prices { asset, records }).await
    }

    pub async fn lastprice(&self, asset: OracleAsset) -> Result<InvocationOutcome> {
        self.call(&OracleCall::LastPrice { asset }).await
    }

    /// Upload new contract code, then point the contract at it.
    pub async fn update_contract(&self, wasm: Vec<u8>) -> Result<InvocationOutcome> {
        let wasm_hash = wasm_hash(&wasm);
        info!(
            contract_id = %self.contract_id,
            wasm_hash = %hex::encode(wasm_hash.0),
            size = wasm.len(),
            "uploading contract code"
        );
        let upload = HostFunction::UploadContractWasm(wasm.try_into()?);
        self.admin.invoke(upload).await?;
        self.call(&OracleCall::UpdateContract { wasm_hash }).await
    }
}

/// Identifier of uploaded contract code: SHA-256 of the wasm bytes
pub fn wasm_hash(wasm: &[u8]) -> Hash {
    Hash(Sha256::digest(wasm).into())
}
