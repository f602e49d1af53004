//! Soroban JSON-RPC client
//!
//! Handles HTTP communication with the network RPC endpoint.
//! Methods documented at: https://developers.stellar.org/docs/data/rpc/api-reference/methods

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use stellar_xdr::curr::{
    AccountId, LedgerEntryData, LedgerKey, LedgerKeyAccount, Limits, ReadXdr, WriteXdr,
};
use tracing::debug;

use crate::error::{OracleError, Result};
use crate::stellar::poll::TransactionStatusSource;

/// Settlement status reported by `getTransaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Not yet observed by the RPC node
    NotFound,
    /// Accepted for inclusion, not yet applied
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "NOT_FOUND" => Some(TransactionStatus::NotFound),
            "PENDING" => Some(TransactionStatus::Pending),
            "SUCCESS" => Some(TransactionStatus::Success),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateHostFunctionResult {
    #[serde(default)]
    pub auth: Vec<String>,
    #[serde(default)]
    pub xdr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateTransactionResponse {
    #[serde(default)]
    pub transaction_data: Option<String>,
    #[serde(default)]
    pub min_resource_fee: Option<String>,
    #[serde(default)]
    pub results: Vec<SimulateHostFunctionResult>,
    #[serde(default)]
    pub error: Option<String>,
    /// Present when the footprint touches archived entries
    #[serde(default)]
    pub restore_preamble: Option<RestorePreamble>,
    #[serde(default)]
    pub latest_ledger: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePreamble {
    pub transaction_data: String,
    pub min_resource_fee: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: String,
    pub hash: String,
    #[serde(default)]
    pub error_result_xdr: Option<String>,
    #[serde(default)]
    pub latest_ledger: u32,
}

/// `getTransaction` answer. `raw` keeps the full payload for error reporting.
#[derive(Debug, Clone)]
pub struct GetTransactionResponse {
    pub status: TransactionStatus,
    pub ledger: Option<u32>,
    pub result_meta_xdr: Option<String>,
    pub raw: Value,
}

impl GetTransactionResponse {
    pub fn from_value(raw: Value) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Fields {
            status: String,
            #[serde(default)]
            ledger: Option<u32>,
            #[serde(default)]
            result_meta_xdr: Option<String>,
        }

        let fields: Fields =
            serde_json::from_value(raw.clone()).map_err(|e| OracleError::RpcResponse {
                method: "getTransaction".into(),
                message: format!("malformed result: {e}"),
            })?;
        let status =
            TransactionStatus::parse(&fields.status).ok_or_else(|| OracleError::RpcResponse {
                method: "getTransaction".into(),
                message: format!("unknown status {}", fields.status),
            })?;
        Ok(Self {
            status,
            ledger: fields.ledger,
            result_meta_xdr: fields.result_meta_xdr,
            raw,
        })
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct JsonRpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC client for a Soroban RPC node
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    /// Create a new RPC client
    pub fn new(url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    /// POST an arbitrary JSON payload and return the decoded body.
    /// Any non-2xx status is an error carrying the response text.
    pub async fn raw(&self, payload: &Value) -> Result<Value> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Rpc {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T> {
        let mut payload = json!({"jsonrpc": "2.0", "id": 1, "method": method});
        if let Some(params) = params {
            payload["params"] = params;
        }
        debug!(method, "RPC request");

        let body = self.raw(&payload).await?;
        let result = unwrap_envelope(method, body)?;
        serde_json::from_value(result).map_err(|e| OracleError::RpcResponse {
            method: method.to_string(),
            message: format!("malformed result: {e}"),
        })
    }

    /// Current sequence number of an account.
    pub async fn get_account_sequence(&self, account_id: &AccountId) -> Result<i64> {
        #[derive(Deserialize)]
        struct Entry {
            xdr: String,
        }
        #[derive(Deserialize)]
        struct Entries {
            #[serde(default)]
            entries: Option<Vec<Entry>>,
        }

        let key = LedgerKey::Account(LedgerKeyAccount {
            account_id: account_id.clone(),
        });
        let params = json!({"keys": [key.to_xdr_base64(Limits::none())?]});
        let resp: Entries = self.call("getLedgerEntries", Some(params)).await?;

        let entry = resp
            .entries
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::RpcResponse {
                method: "getLedgerEntries".into(),
                message: "account not found".into(),
            })?;
        match LedgerEntryData::from_xdr_base64(&entry.xdr, Limits::none())? {
            LedgerEntryData::Account(account) => Ok(account.seq_num.0),
            _ => Err(OracleError::RpcResponse {
                method: "getLedgerEntries".into(),
                message: "ledger entry is not an account".into(),
            }),
        }
    }

    pub async fn simulate_transaction(
        &self,
        envelope_xdr: &str,
    ) -> Result<SimulateTransactionResponse> {
        self.call(
            "simulateTransaction",
            Some(json!({"transaction": envelope_xdr})),
        )
        .await
    }

    pub async fn send_transaction(&self, envelope_xdr: &str) -> Result<SendTransactionResponse> {
        self.call("sendTransaction", Some(json!({"transaction": envelope_xdr})))
            .await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse> {
        let raw: Value = self
            .call("getTransaction", Some(json!({"hash": hash})))
            .await?;
        GetTransactionResponse::from_value(raw)
    }
}

#[async_trait]
impl TransactionStatusSource for RpcClient {
    async fn transaction_status(&self, hash: &str) -> Result<GetTransactionResponse> {
        self.get_transaction(hash).await
    }
}

/// Build the `getLatestLedger` passthrough payload.
pub fn latest_ledger_request() -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "method": "getLatestLedger"})
}

/// Build the `getEvents` passthrough payload filtered to one contract.
pub fn events_request(start_ledger: u32, contract_id: &str, limit: u32) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "getEvents",
        "params": {
            "startLedger": start_ledger,
            "filters": [
                {
                    "type": "contract",
                    "contractIds": [contract_id],
                }
            ],
            "pagination": {"limit": limit},
        }
    })
}

fn unwrap_envelope(method: &str, body: Value) -> Result<Value> {
    let envelope: JsonRpcEnvelope =
        serde_json::from_value(body).map_err(|e| OracleError::RpcResponse {
            method: method.to_string(),
            message: format!("malformed JSON-RPC response: {e}"),
        })?;
    if let Some(err) = envelope.error {
        return Err(OracleError::RpcResponse {
            method: method.to_string(),
            message: format!("{} (code {})", err.message, err.code),
        });
    }
    envelope.result.ok_or_else(|| OracleError::RpcResponse {
        method: method.to_string(),
        message: "response carries neither result nor error".into(),
    })
}
