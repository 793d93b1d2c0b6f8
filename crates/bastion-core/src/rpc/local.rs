//! Submission with an in-process key.
//!
//! [`LocalSender`] fills nonce, gas and fees from the node, signs the
//! envelope locally and submits it with `eth_sendRawTransaction`. Requests
//! carrying authorizations become EIP-7702 transactions, everything else
//! EIP-1559.

use alloy_primitives::U256;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::RpcProvider;
use crate::address::Address;
use crate::chain::{ChainWriter, Receipt, TxHash, TxRequest};
use crate::crypto::Keypair;
use crate::error::{Error, Result};
use crate::transaction::{Eip1559Transaction, Eip7702Transaction, TypedTransaction};

/// Headroom applied to `eth_estimateGas`, in percent.
const GAS_HEADROOM_PERCENT: u64 = 120;

/// Signs and submits transactions from one key.
pub struct LocalSender {
    key: Keypair,
    chain_id: u64,
    provider: RpcProvider,
}

impl LocalSender {
    /// Creates a sender for `key` on `chain_id`.
    #[must_use]
    pub const fn new(key: Keypair, chain_id: u64, provider: RpcProvider) -> Self {
        Self {
            key,
            chain_id,
            provider,
        }
    }

    /// Returns the sending account.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.key.address()
    }

    async fn fees(&self) -> Result<(U256, U256)> {
        let gas_price = self.provider.gas_price().await?;
        let priority = match self.provider.max_priority_fee().await {
            Ok(priority) => priority,
            Err(err) => {
                warn!(error = %err, "eth_maxPriorityFeePerGas unavailable, using gas price");
                gas_price
            }
        };
        let max_fee = gas_price.saturating_mul(U256::from(2u8)).saturating_add(priority);
        Ok((priority, max_fee))
    }

    /// Builds the unsigned envelope for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] if `request.from` is not this key, or any
    /// error filling nonce, gas or fees.
    pub async fn fill(&self, request: &TxRequest) -> Result<TypedTransaction> {
        if request.from != self.key.address() {
            return Err(Error::Wallet(format!(
                "local key {} cannot send for {}",
                self.key.address(),
                request.from
            )));
        }

        let nonce = self.provider.nonce(request.from).await?;
        let estimate = self.provider.estimate_gas(request).await?;
        let gas_limit = estimate.saturating_mul(GAS_HEADROOM_PERCENT) / 100;
        let (max_priority_fee_per_gas, max_fee_per_gas) = self.fees().await?;

        let base = Eip1559Transaction {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to: request.to,
            value: request.value,
            data: request.data.to_vec(),
        };

        Ok(if request.authorization_list.is_empty() {
            TypedTransaction::Eip1559(base)
        } else {
            TypedTransaction::Eip7702(Eip7702Transaction {
                base,
                authorization_list: request.authorization_list.clone(),
            })
        })
    }
}

#[async_trait]
impl ChainWriter for LocalSender {
    async fn simulate_then_send(&self, request: TxRequest) -> Result<TxHash> {
        self.provider.simulate(&request).await?;

        let tx = self.fill(&request).await?;
        let signature = self.key.sign_prehash(&tx.signing_hash())?;
        let raw = tx.signed_rlp(&signature)?;
        let local = TxHash(tx.transaction_hash(&signature)?);
        debug!(tx_type = tx.tx_type(), nonce = tx.base().nonce, %local, "submitting raw transaction");

        let hash = self.provider.send_raw(&raw).await?;
        if hash != local {
            warn!(%hash, %local, "node reported a different transaction hash");
        }
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt> {
        self.provider.wait_for_receipt(hash).await
    }
}
