//! Error taxonomy shared by the CLI and the batch feeder

use thiserror::Error;

pub type Result<T, E = OracleError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum OracleError {
    /// Missing or invalid settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level failure or a non-2xx HTTP answer from the RPC endpoint.
    #[error("failed to perform RPC request: status={status} response={body}")]
    Rpc { status: u16, body: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The RPC endpoint answered, but with a JSON-RPC error or an unexpected shape.
    #[error("RPC {method} failed: {message}")]
    RpcResponse { method: String, message: String },

    #[error("simulation failed: {0}")]
    Simulation(String),

    /// `sendTransaction` did not accept the transaction.
    #[error("failed to send transaction: status={status} response={detail}")]
    SubmissionRejected { status: String, detail: String },

    /// The transaction settled with a status other than success.
    #[error("transaction {hash} failed: {detail}")]
    TransactionFailed { hash: String, detail: String },

    #[error("transaction {hash} was not observed within {waited_secs}s")]
    PollTimeout { hash: String, waited_secs: u64 },

    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unrecognized settlement asset: {0}")]
    UnrecognizedSettlementAsset(String),

    #[error("invalid price payload: {0}")]
    Payload(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<base64::DecodeError> for OracleError {
    fn from(err: base64::DecodeError) -> Self {
        OracleError::Payload(format!("base64: {err}"))
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::Payload(format!("json: {err}"))
    }
}

impl From<config::ConfigError> for OracleError {
    fn from(err: config::ConfigError) -> Self {
        OracleError::Config(err.to_string())
    }
}
