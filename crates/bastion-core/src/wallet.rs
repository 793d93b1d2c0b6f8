//! The owner's signing wallet.
//!
//! [`WalletSigner`] is what the protocol needs from the owner: typed-data
//! signatures, the connected chain and the connected accounts. Which
//! backend answers is a configuration choice (see [`crate::config::WalletKind`]):
//!
//! - [`LocalWallet`]: a private key held in process
//! - [`crate::rpc::Eip1193Wallet`]: an injected, embedded or remote-custody
//!   provider reached over JSON-RPC

use async_trait::async_trait;

use crate::address::Address;
use crate::crypto::Keypair;
use crate::eip712::TypedData;
use crate::error::{Error, Result};

/// A wallet able to sign EIP-712 typed data for the owner.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Signs `typed_data` and returns the raw 65-byte `r || s || v`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] if the wallet refuses or fails.
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Vec<u8>>;

    /// Returns the chain the wallet is connected to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] or a transport error.
    async fn chain_id(&self) -> Result<u64>;

    /// Returns the connected accounts. The first one is the owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] or a transport error.
    async fn addresses(&self) -> Result<Vec<Address>>;
}

/// Returns the connected owner account.
///
/// # Errors
///
/// Returns [`Error::Wallet`] if the wallet exposes no account.
pub async fn owner_account(wallet: &dyn WalletSigner) -> Result<Address> {
    wallet
        .addresses()
        .await?
        .first()
        .copied()
        .ok_or_else(|| Error::Wallet("wallet exposes no accounts".to_string()))
}

/// A wallet backed by an in-process private key.
#[derive(Debug)]
pub struct LocalWallet {
    key: Keypair,
    chain_id: u64,
}

impl LocalWallet {
    /// Wraps `key` for use on `chain_id`.
    #[must_use]
    pub const fn new(key: Keypair, chain_id: u64) -> Self {
        Self { key, chain_id }
    }

    /// Returns the key's account.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.key.address()
    }

    /// Returns the underlying key.
    #[must_use]
    pub const fn keypair(&self) -> &Keypair {
        &self.key
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Vec<u8>> {
        let digest = typed_data.signing_hash()?;
        Ok(self.key.sign_prehash(&digest)?.to_bytes().to_vec())
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.key.address()])
    }
}
