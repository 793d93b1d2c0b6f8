//! The owner backend chosen by configuration.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Eip1193Wallet, LocalSender, RpcProvider, RpcTransport};
use crate::address::Address;
use crate::chain::{ChainWriter, Receipt, TxHash, TxRequest};
use crate::config::{WalletConfig, WalletKind};
use crate::crypto::Keypair;
use crate::eip712::TypedData;
use crate::error::{Error, Result};
use crate::wallet::{LocalWallet, WalletSigner};

/// The owner's wallet: signs approvals and sends owner transactions.
pub enum OwnerWallet {
    /// An in-process key. Transactions are signed locally.
    Local {
        /// Typed-data signer.
        signer: LocalWallet,
        /// Transaction sender for the same key.
        sender: LocalSender,
    },
    /// An EIP-1193 provider that signs and sends itself.
    Provider(Eip1193Wallet),
}

impl OwnerWallet {
    /// Builds the backend `config` names. `wallet_transport` reaches the
    /// provider wallet and is ignored for [`WalletKind::Local`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an incomplete configuration, plus any
    /// key or connection error.
    pub async fn connect_with(
        config: &WalletConfig,
        provider: RpcProvider,
        wallet_transport: Option<Arc<dyn RpcTransport>>,
    ) -> Result<Self> {
        config.validate()?;
        match config.kind {
            WalletKind::Local => {
                let secret = config.private_key.as_deref().ok_or_else(|| {
                    Error::Config("local wallet requires a private key".to_string())
                })?;
                let key = Keypair::from_hex(secret)?;
                let chain_id = provider.chain_id().await?;
                Ok(Self::Local {
                    signer: LocalWallet::new(key.clone(), chain_id),
                    sender: LocalSender::new(key, chain_id, provider),
                })
            }
            kind => {
                let transport = wallet_transport.ok_or_else(|| {
                    Error::Config(format!("{kind} wallet requires a transport"))
                })?;
                Ok(Self::Provider(
                    Eip1193Wallet::connect(kind, transport, provider).await?,
                ))
            }
        }
    }

    /// Builds the backend `config` names, reaching provider wallets over
    /// HTTP at `config.endpoint`.
    ///
    /// # Errors
    ///
    /// See [`OwnerWallet::connect_with`].
    #[cfg(feature = "http")]
    pub async fn connect(config: &WalletConfig, provider: RpcProvider) -> Result<Self> {
        let transport = match (&config.kind, &config.endpoint) {
            (WalletKind::Local, _) | (_, None) => None,
            (_, Some(endpoint)) => {
                Some(Arc::new(super::HttpTransport::new(endpoint.clone())?) as Arc<dyn RpcTransport>)
            }
        };
        Self::connect_with(config, provider, transport).await
    }

    /// Returns the owner account.
    #[must_use]
    pub const fn account(&self) -> Address {
        match self {
            Self::Local { signer, .. } => signer.address(),
            Self::Provider(wallet) => wallet.account(),
        }
    }

    /// Returns the backend kind.
    #[must_use]
    pub const fn kind(&self) -> WalletKind {
        match self {
            Self::Local { .. } => WalletKind::Local,
            Self::Provider(wallet) => wallet.kind(),
        }
    }
}

#[async_trait]
impl WalletSigner for OwnerWallet {
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Vec<u8>> {
        match self {
            Self::Local { signer, .. } => signer.sign_typed_data(typed_data).await,
            Self::Provider(wallet) => wallet.sign_typed_data(typed_data).await,
        }
    }

    async fn chain_id(&self) -> Result<u64> {
        match self {
            Self::Local { signer, .. } => signer.chain_id().await,
            Self::Provider(wallet) => wallet.chain_id().await,
        }
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        match self {
            Self::Local { signer, .. } => signer.addresses().await,
            Self::Provider(wallet) => wallet.addresses().await,
        }
    }
}

#[async_trait]
impl ChainWriter for OwnerWallet {
    async fn simulate_then_send(&self, request: TxRequest) -> Result<TxHash> {
        match self {
            Self::Local { sender, .. } => sender.simulate_then_send(request).await,
            Self::Provider(wallet) => wallet.simulate_then_send(request).await,
        }
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt> {
        match self {
            Self::Local { sender, .. } => sender.wait_for_confirmation(hash).await,
            Self::Provider(wallet) => wallet.wait_for_confirmation(hash).await,
        }
    }
}
