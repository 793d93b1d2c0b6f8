//! EIP-1193 provider wallets.
//!
//! Injected, embedded and remote-custody wallets all speak the same JSON-RPC
//! methods; they differ in how accounts are exposed, which
//! [`WalletKind::accounts_method`] captures.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::provider::tx_object;
use super::{RpcProvider, RpcTransport, parse_data, parse_hash, parse_u64};
use crate::address::Address;
use crate::chain::{ChainWriter, Receipt, TxHash, TxRequest};
use crate::config::WalletKind;
use crate::eip712::TypedData;
use crate::error::{Error, Result};
use crate::wallet::WalletSigner;

/// Wallet-side failures surface as [`Error::Wallet`]; reverts keep their
/// own variant.
fn wallet_error(method: &str, err: Error) -> Error {
    match err {
        Error::Rpc { code, message } => Error::Wallet(format!("{method}: {message} ({code})")),
        other => other,
    }
}

/// A wallet provider reached over JSON-RPC.
pub struct Eip1193Wallet {
    kind: WalletKind,
    transport: Arc<dyn RpcTransport>,
    provider: RpcProvider,
    account: Address,
}

impl Eip1193Wallet {
    /// Connects to the wallet and selects its first account.
    ///
    /// `provider` is used for simulation and receipts. It may share
    /// `transport` or point at a separate node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Wallet`] if the wallet refuses or exposes no account.
    pub async fn connect(
        kind: WalletKind,
        transport: Arc<dyn RpcTransport>,
        provider: RpcProvider,
    ) -> Result<Self> {
        let accounts = request_accounts(kind, transport.as_ref()).await?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| Error::Wallet(format!("{kind} wallet exposes no accounts")))?;
        info!(%kind, %account, "wallet connected");

        Ok(Self {
            kind,
            transport,
            provider,
            account,
        })
    }

    /// Returns the connected account.
    #[must_use]
    pub const fn account(&self) -> Address {
        self.account
    }

    /// Returns the backend kind.
    #[must_use]
    pub const fn kind(&self) -> WalletKind {
        self.kind
    }
}

async fn request_accounts(kind: WalletKind, transport: &dyn RpcTransport) -> Result<Vec<Address>> {
    let method = kind.accounts_method();
    let value = transport
        .request(method, json!([]))
        .await
        .map_err(|e| wallet_error(method, e))?;
    let entries = value
        .as_array()
        .ok_or_else(|| Error::Wallet(format!("{method}: expected an array, got {value}")))?;

    entries
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .ok_or_else(|| Error::Wallet(format!("{method}: non-string account {entry}")))
                .and_then(Address::parse)
        })
        .collect()
}

#[async_trait]
impl WalletSigner for Eip1193Wallet {
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Vec<u8>> {
        let document = serde_json::to_string(&typed_data.to_rpc_value()?)?;
        debug!(account = %self.account, "eth_signTypedData_v4");
        let value = self
            .transport
            .request(
                "eth_signTypedData_v4",
                json!([self.account.to_hex(), document]),
            )
            .await
            .map_err(|e| wallet_error("eth_signTypedData_v4", e))?;
        Ok(parse_data(&value, "eth_signTypedData_v4")?.to_vec())
    }

    async fn chain_id(&self) -> Result<u64> {
        let value = self
            .transport
            .request("eth_chainId", json!([]))
            .await
            .map_err(|e| wallet_error("eth_chainId", e))?;
        parse_u64(&value, "eth_chainId")
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        request_accounts(self.kind, self.transport.as_ref()).await
    }
}

#[async_trait]
impl ChainWriter for Eip1193Wallet {
    async fn simulate_then_send(&self, request: TxRequest) -> Result<TxHash> {
        self.provider.simulate(&request).await?;

        let value: Value = self
            .transport
            .request("eth_sendTransaction", json!([tx_object(&request)]))
            .await
            .map_err(|e| wallet_error("eth_sendTransaction", e))?;
        Ok(TxHash(parse_hash(&value, "eth_sendTransaction")?))
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt> {
        self.provider.wait_for_receipt(hash).await
    }
}
