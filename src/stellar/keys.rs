//! Ed25519 signer keys and strkey helpers

use ed25519_dalek::{Signer as _, SigningKey};
use stellar_xdr::curr::{
    AccountId, ContractId, DecoratedSignature, Hash, MuxedAccount, PublicKey, ScAddress, Signature,
    SignatureHint, Uint256,
};

use crate::error::{OracleError, Result};

/// A Stellar account keypair able to sign transaction hashes.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Parse an `S...` secret seed.
    pub fn from_secret(secret: &str) -> Result<Self> {
        let seed = stellar_strkey::ed25519::PrivateKey::from_string(secret.trim())
            .map_err(|e| OracleError::InvalidKey(format!("not a valid secret seed: {e}")))?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed.0),
        })
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// `G...` account address
    pub fn public_key(&self) -> String {
        stellar_strkey::ed25519::PublicKey(self.public_key_bytes()).to_string()
    }

    pub fn account_id(&self) -> AccountId {
        AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(
            self.public_key_bytes(),
        )))
    }

    pub fn muxed_account(&self) -> MuxedAccount {
        MuxedAccount::Ed25519(Uint256(self.public_key_bytes()))
    }

    /// Sign a 32-byte transaction hash, producing the envelope signature.
    pub fn sign_decorated(&self, tx_hash: &[u8; 32]) -> Result<DecoratedSignature> {
        let signature = self.signing_key.sign(tx_hash);
        let public = self.public_key_bytes();
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&public[28..]);
        Ok(DecoratedSignature {
            hint: SignatureHint(hint),
            signature: Signature(signature.to_bytes().to_vec().try_into()?),
        })
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish()
    }
}

/// Parse a `C...` contract id.
pub fn parse_contract_id(contract_id: &str) -> Result<ContractId> {
    stellar_strkey::Contract::from_string(contract_id.trim())
        .map(|c| ContractId(Hash(c.0)))
        .map_err(|e| OracleError::InvalidKey(format!("not a valid contract id: {e}")))
}

/// Parse a `G...` account or `C...` contract address into a contract address value.
pub fn parse_address(address: &str) -> Result<ScAddress> {
    let address = address.trim();
    if let Ok(account) = stellar_strkey::ed25519::PublicKey::from_string(address) {
        return Ok(ScAddress::Account(AccountId(
            PublicKey::PublicKeyTypeEd25519(Uint256(account.0)),
        )));
    }
    if let Ok(contract) = stellar_strkey::Contract::from_string(address) {
        return Ok(ScAddress::Contract(ContractId(Hash(contract.0))));
    }
    Err(OracleError::InvalidArgument(format!(
        "not a valid account or contract address: {address}"
    )))
}

/// Render an address back to its strkey form.
pub fn address_to_string(address: &ScAddress) -> String {
    match address {
        ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(bytes)))) => {
            stellar_strkey::ed25519::PublicKey(*bytes).to_string()
        }
        ScAddress::Contract(ContractId(Hash(bytes))) => {
            stellar_strkey::Contract(*bytes).to_string()
        }
        ScAddress::MuxedAccount(muxed) => stellar_strkey::ed25519::MuxedAccount {
            ed25519: muxed.ed25519.0,
            id: muxed.id,
        }
        .to_string(),
        ScAddress::ClaimableBalance(_) => "<claimable balance>".to_string(),
        ScAddress::LiquidityPool(_) => "<liquidity pool>".to_string(),
    }
}
