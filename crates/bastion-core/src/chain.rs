//! Chain access: read, simulate, send and confirm.
//!
//! [`ChainReader`] and [`ChainWriter`] are the only ways the protocol
//! touches a node. The JSON-RPC implementations live in [`crate::rpc`];
//! tests substitute in-memory chains.
//!
//! The free functions below are typed wrappers over
//! [`ChainReader::read_contract`] for the calls the protocol makes.

use std::fmt;

use alloy_primitives::{B256, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::abi;
use crate::address::Address;
use crate::approval::Approval;
use crate::authorization::SignedAuthorization;
use crate::error::{Error, Result};
use crate::signature::Signature;

/// A transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub B256);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A state-changing call to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// The sending account.
    pub from: Address,
    /// The target contract.
    pub to: Address,
    /// ABI-encoded calldata.
    pub data: Bytes,
    /// Native value in wei.
    pub value: U256,
    /// EIP-7702 delegations. A non-empty list makes this a type-4
    /// transaction.
    pub authorization_list: Vec<SignedAuthorization>,
}

impl TxRequest {
    /// Creates a zero-value call without authorizations.
    #[must_use]
    pub const fn call(from: Address, to: Address, data: Bytes) -> Self {
        Self {
            from,
            to,
            data,
            value: U256::ZERO,
            authorization_list: Vec::new(),
        }
    }

    /// Attaches EIP-7702 authorizations.
    #[must_use]
    pub fn with_authorizations(mut self, authorizations: Vec<SignedAuthorization>) -> Self {
        self.authorization_list = authorizations;
        self
    }
}

/// The subset of a transaction receipt the protocol inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// The mined transaction.
    pub transaction_hash: TxHash,
    /// `true` for status 1.
    pub success: bool,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

/// Read access to chain state.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Executes `eth_call` against `to` and returns the raw return data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reverted`] if the call reverts, or a transport error.
    async fn read_contract(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// Returns the native balance of `account` in wei.
    ///
    /// # Errors
    ///
    /// Returns a transport or RPC error.
    async fn balance(&self, account: Address) -> Result<U256>;
}

/// Write access: submit transactions and wait for them.
#[async_trait]
pub trait ChainWriter: Send + Sync {
    /// Simulates `request` and, if the simulation succeeds, submits it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reverted`] if the simulation reverts, or the
    /// wallet/transport error that prevented submission.
    async fn simulate_then_send(&self, request: TxRequest) -> Result<TxHash>;

    /// Waits until `hash` is mined.
    ///
    /// A mined-but-failed transaction is returned as a receipt with
    /// `success == false`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] if the transaction is not mined
    /// before the writer's timeout.
    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt>;
}

/// Submits `request` and waits for a successful receipt.
///
/// # Errors
///
/// Returns [`Error::Reverted`] for a status-0 receipt, plus anything
/// [`ChainWriter`] returns.
pub async fn send_and_confirm(writer: &dyn ChainWriter, request: TxRequest) -> Result<Receipt> {
    let to = request.to;
    let hash = writer.simulate_then_send(request).await?;
    debug!(%hash, %to, "transaction submitted");

    let receipt = writer.wait_for_confirmation(hash).await?;
    if !receipt.success {
        return Err(Error::Reverted(format!("transaction {hash} reverted")));
    }
    debug!(%hash, block = ?receipt.block_number, "transaction confirmed");
    Ok(receipt)
}

/// `factory.getDigest(approval)`
///
/// # Errors
///
/// Returns read or decode errors.
pub async fn get_digest(
    reader: &dyn ChainReader,
    factory: Address,
    approval: &Approval,
) -> Result<B256> {
    let data = reader
        .read_contract(factory, abi::get_digest_call(&approval.to_abi()))
        .await?;
    abi::decode_digest(&data)
}

/// `factory.getBastionAddress(chainId, v, r, s)`
///
/// # Errors
///
/// Returns read or decode errors.
pub async fn get_bastion_address(
    reader: &dyn ChainReader,
    factory: Address,
    chain_id: u64,
    signature: &Signature,
) -> Result<Address> {
    let data = reader
        .read_contract(factory, abi::get_bastion_address_call(chain_id, signature))
        .await?;
    abi::decode_address(&data)
}

/// `factory.impl()`
///
/// # Errors
///
/// Returns read or decode errors.
pub async fn implementation(reader: &dyn ChainReader, factory: Address) -> Result<Address> {
    let data = reader.read_contract(factory, abi::impl_call()).await?;
    abi::decode_impl(&data)
}

/// `token.allowance(owner, spender)`
///
/// # Errors
///
/// Returns read or decode errors.
pub async fn allowance(
    reader: &dyn ChainReader,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256> {
    let data = reader
        .read_contract(token, abi::allowance_call(&owner, &spender))
        .await?;
    abi::decode_uint(&data)
}

/// `token.balanceOf(account)`
///
/// # Errors
///
/// Returns read or decode errors.
pub async fn token_balance(
    reader: &dyn ChainReader,
    token: Address,
    account: Address,
) -> Result<U256> {
    let data = reader
        .read_contract(token, abi::balance_of_call(&account))
        .await?;
    abi::decode_uint(&data)
}

/// `session.operator()`, decoded from its packed `bytes` form.
///
/// # Errors
///
/// Returns read or decode errors, or [`Error::InvalidAddress`] if the
/// stored bytes are not a 20-byte address.
pub async fn operator(reader: &dyn ChainReader, session: Address) -> Result<Address> {
    let data = reader.read_contract(session, abi::operator_call()).await?;
    Address::from_packed(&abi::decode_operator(&data)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct FixedReader {
        response: Bytes,
        calls: Mutex<Vec<(Address, Bytes)>>,
    }

    #[async_trait]
    impl ChainReader for FixedReader {
        async fn read_contract(&self, to: Address, data: Bytes) -> Result<Bytes> {
            self.calls.lock().unwrap().push((to, data));
            Ok(self.response.clone())
        }

        async fn balance(&self, _account: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }
    }

    struct ScriptedWriter {
        success: bool,
    }

    #[async_trait]
    impl ChainWriter for ScriptedWriter {
        async fn simulate_then_send(&self, _request: TxRequest) -> Result<TxHash> {
            Ok(TxHash(B256::repeat_byte(0x01)))
        }

        async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt> {
            Ok(Receipt {
                transaction_hash: hash,
                success: self.success,
                block_number: Some(1),
            })
        }
    }

    #[tokio::test]
    async fn implementation_reads_factory() {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&[0x77; 20]);
        let reader = FixedReader {
            response: Bytes::copy_from_slice(&word),
            calls: Mutex::new(Vec::new()),
        };
        let factory = Address::new([0xfa; 20]);

        let implementation = implementation(&reader, factory).await.unwrap();

        assert_eq!(implementation, Address::new([0x77; 20]));
        let calls = reader.calls.lock().unwrap();
        assert_eq!(calls[0].0, factory);
        assert_eq!(calls[0].1, abi::impl_call());
    }

    #[tokio::test]
    async fn operator_rejects_non_address_bytes() {
        // ABI encoding of `bytes` 0x1234.
        let mut encoded = vec![0u8; 96];
        encoded[31] = 0x20;
        encoded[63] = 2;
        encoded[64] = 0x12;
        encoded[65] = 0x34;
        let reader = FixedReader {
            response: encoded.into(),
            calls: Mutex::new(Vec::new()),
        };

        assert!(matches!(
            operator(&reader, Address::new([1u8; 20])).await,
            Err(Error::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn status_zero_receipt_is_a_revert() {
        let request = TxRequest::call(Address::zero(), Address::zero(), Bytes::new());

        let err = send_and_confirm(&ScriptedWriter { success: false }, request.clone())
            .await
            .unwrap_err();
        assert!(err.is_revert());
        assert!(
            send_and_confirm(&ScriptedWriter { success: true }, request)
                .await
                .is_ok()
        );
    }
}
