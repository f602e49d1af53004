//! Transaction building, assembly and signing
//!
//! A contract call goes through build → simulate → assemble → sign → send →
//! wait. The simulation supplies the footprint, resource fee and
//! authorization entries that the final transaction must carry.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::time::Duration;
use stellar_xdr::curr::{
    Hash, HostFunction, InvokeHostFunctionOp, Limits, Memo, Operation, OperationBody,
    Preconditions, ReadXdr, ScVal, SequenceNumber, SorobanAuthorizationEntry,
    SorobanTransactionData, TimeBounds, TimePoint, Transaction, TransactionEnvelope,
    TransactionExt, TransactionMeta, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, TransactionV1Envelope, VecM, WriteXdr,
};
use tracing::{debug, warn};

use crate::error::{OracleError, Result};
use crate::stellar::keys::Keypair;
use crate::stellar::poll::{wait_for_transaction, PollPolicy};
use crate::stellar::rpc::{
    GetTransactionResponse, RpcClient, SimulateTransactionResponse, TransactionStatus,
};
use crate::stellar::scval::ContractValue;

/// Network id: SHA-256 of the network passphrase
pub fn network_id(passphrase: &str) -> Hash {
    Hash(Sha256::digest(passphrase.as_bytes()).into())
}

/// Single-operation transaction invoking a host function.
pub fn build_transaction(
    source: &Keypair,
    sequence: i64,
    fee: u32,
    max_time: u64,
    host_function: HostFunction,
) -> Result<Transaction> {
    let op = Operation {
        source_account: None,
        body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
            host_function,
            auth: VecM::default(),
        }),
    };
    Ok(Transaction {
        source_account: source.muxed_account(),
        fee,
        seq_num: SequenceNumber(sequence),
        cond: Preconditions::Time(TimeBounds {
            min_time: TimePoint(0),
            max_time: TimePoint(max_time),
        }),
        memo: Memo::None,
        operations: vec![op].try_into()?,
        ext: TransactionExt::V0,
    })
}

/// Apply a simulation result: resource data, fee and authorization entries.
pub fn assemble(
    tx: Transaction,
    sim: &SimulateTransactionResponse,
    base_fee: u32,
) -> Result<Transaction> {
    if let Some(err) = &sim.error {
        return Err(OracleError::Simulation(err.clone()));
    }
    if let Some(preamble) = &sim.restore_preamble {
        return Err(OracleError::Simulation(format!(
            "archived ledger entries must be restored first (restore fee {})",
            preamble.min_resource_fee
        )));
    }
    let data = sim
        .transaction_data
        .as_deref()
        .ok_or_else(|| OracleError::Simulation("missing transactionData".into()))?;
    let data = SorobanTransactionData::from_xdr_base64(data, Limits::none())?;

    let resource_fee: u64 = sim
        .min_resource_fee
        .as_deref()
        .unwrap_or("0")
        .parse()
        .map_err(|e| OracleError::Simulation(format!("invalid minResourceFee: {e}")))?;
    let fee = u32::try_from(base_fee as u64 + resource_fee)
        .map_err(|_| OracleError::Simulation(format!("fee overflow: {resource_fee}")))?;

    let auth = match sim.results.first() {
        Some(result) => result
            .auth
            .iter()
            .map(|entry| SorobanAuthorizationEntry::from_xdr_base64(entry, Limits::none()))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let mut operations = tx.operations.to_vec();
    for op in operations.iter_mut() {
        if let OperationBody::InvokeHostFunction(invoke) = &mut op.body {
            if invoke.auth.is_empty() {
                invoke.auth = auth.clone().try_into()?;
            }
        }
    }

    Ok(Transaction {
        fee,
        operations: operations.try_into()?,
        ext: TransactionExt::V1(data),
        ..tx
    })
}

pub fn transaction_hash(tx: &Transaction, network_id: &Hash) -> Result<[u8; 32]> {
    let payload = TransactionSignaturePayload {
        network_id: network_id.clone(),
        tagged_transaction: TransactionSignaturePayloadTaggedTransaction::Tx(tx.clone()),
    };
    Ok(Sha256::digest(payload.to_xdr(Limits::none())?).into())
}

pub fn sign(tx: Transaction, signer: &Keypair, network_id: &Hash) -> Result<TransactionEnvelope> {
    let hash = transaction_hash(&tx, network_id)?;
    let signature = signer.sign_decorated(&hash)?;
    Ok(TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: vec![signature].try_into()?,
    }))
}

pub fn unsigned_envelope(tx: Transaction) -> TransactionEnvelope {
    TransactionEnvelope::Tx(TransactionV1Envelope {
        tx,
        signatures: VecM::default(),
    })
}

pub fn envelope_xdr(envelope: &TransactionEnvelope) -> Result<String> {
    Ok(envelope.to_xdr_base64(Limits::none())?)
}

/// Extract the contract return value from `resultMetaXdr`.
///
/// V4 meta leaves the value out for calls returning nothing; that reads as void.
pub fn return_value(result_meta_xdr: &str) -> Result<ScVal> {
    let missing = || OracleError::RpcResponse {
        method: "getTransaction".into(),
        message: "transaction meta has no Soroban section".into(),
    };
    match TransactionMeta::from_xdr_base64(result_meta_xdr, Limits::none())? {
        TransactionMeta::V3(meta) => meta
            .soroban_meta
            .map(|soroban| soroban.return_value)
            .ok_or_else(missing),
        TransactionMeta::V4(meta) => meta
            .soroban_meta
            .map(|soroban| soroban.return_value.unwrap_or(ScVal::Void))
            .ok_or_else(missing),
        other => Err(OracleError::RpcResponse {
            method: "getTransaction".into(),
            message: format!("unsupported transaction meta version {}", other.name()),
        }),
    }
}

/// A settled, successful contract call
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub hash: String,
    pub response: GetTransactionResponse,
    pub return_value: Option<ScVal>,
}

impl InvocationOutcome {
    pub fn decoded(&self) -> ContractValue {
        match &self.return_value {
            Some(val) => ContractValue::from(val),
            None => ContractValue::Unsupported("unknown"),
        }
    }
}

/// Signs and submits host function invocations for one source account.
#[derive(Debug, Clone)]
pub struct SorobanInvoker {
    rpc: RpcClient,
    signer: Keypair,
    network_id: Hash,
    base_fee: u32,
    tx_timeout: Duration,
    poll: PollPolicy,
}

impl SorobanInvoker {
    pub fn new(
        rpc: RpcClient,
        signer: Keypair,
        network_passphrase: &str,
        base_fee: u32,
        tx_timeout: Duration,
        poll: PollPolicy,
    ) -> Self {
        Self {
            rpc,
            signer,
            network_id: network_id(network_passphrase),
            base_fee,
            tx_timeout,
            poll,
        }
    }

    pub fn signer(&self) -> &Keypair {
        &self.signer
    }

    /// Run one host function through the full transaction lifecycle.
    pub async fn invoke(&self, host_function: HostFunction) -> Result<InvocationOutcome> {
        let sequence = self
            .rpc
            .get_account_sequence(&self.signer.account_id())
            .await?
            + 1;
        let max_time = Utc::now().timestamp().max(0) as u64 + self.tx_timeout.as_secs();
        let tx = build_transaction(&self.signer, sequence, self.base_fee, max_time, host_function)?;

        let unsigned = envelope_xdr(&unsigned_envelope(tx.clone()))?;
        debug!(xdr = %unsigned, "preparing transaction");
        let sim = self.rpc.simulate_transaction(&unsigned).await?;

        let tx = assemble(tx, &sim, self.base_fee)?;
        let envelope = sign(tx, &self.signer, &self.network_id)?;
        let signed = envelope_xdr(&envelope)?;
        debug!(xdr = %signed, "prepared transaction");

        let sent = self.rpc.send_transaction(&signed).await?;
        debug!(hash = %sent.hash, status = %sent.status, "sent transaction");
        if sent.status != "PENDING" {
            return Err(OracleError::SubmissionRejected {
                status: sent.status.clone(),
                detail: format!("{sent:?}"),
            });
        }

        let response = wait_for_transaction(&self.rpc, &sent.hash, &self.poll).await?;
        debug!(transaction = %response.raw, "transaction");
        if response.status != TransactionStatus::Success {
            return Err(OracleError::TransactionFailed {
                hash: sent.hash,
                detail: response.raw.to_string(),
            });
        }

        let return_value = match response.result_meta_xdr.as_deref().map(return_value) {
            Some(Ok(val)) => Some(val),
            Some(Err(e)) => {
                warn!(hash = %sent.hash, error = %e, "could not decode return value");
                None
            }
            None => None,
        };

        Ok(InvocationOutcome {
            hash: sent.hash,
            response,
            return_value,
        })
    }
}
