//! SEP-40 Oracle Library
//!
//! Client for a Soroban price oracle contract and a batch feeder that moves
//! prices from a local database on-chain.

pub mod cli;
pub mod config;
pub mod error;
pub mod feeder;
pub mod oracle;
pub mod persistence;
pub mod stellar;
pub mod types;

pub use error::{OracleError, Result};
