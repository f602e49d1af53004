//! Stellar network access
//!
//! Implements the pieces needed to call a Soroban contract:
//! - Signer keys and strkey parsing
//! - Contract argument encoding and return value decoding
//! - JSON-RPC client for the RPC node
//! - Transaction building, simulation-based assembly and signing
//! - Waiting for submitted transactions to settle

pub mod keys;
pub mod poll;
pub mod rpc;
pub mod scval;
pub mod transaction;

#[cfg(test)]
pub(crate) mod stub_server;

pub use keys::Keypair;
pub use poll::{wait_for_transaction, PollPolicy, TransactionStatusSource};
pub use rpc::{GetTransactionResponse, RpcClient, TransactionStatus};
pub use scval::ContractValue;
pub use transaction::{InvocationOutcome, SorobanInvoker};
