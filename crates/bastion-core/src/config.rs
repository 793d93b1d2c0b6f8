//! Protocol and wallet configuration.
//!
//! The core never reads the environment. Front ends build a
//! [`ProtocolConfig`] and a [`WalletConfig`] and pass them in.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::{Error, Result};

/// Origin whose hash fills the approval's `domain` field by default.
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://dashboard.zerodev.app";

/// EIP-712 domain name of the factory.
pub const DEFAULT_EIP712_NAME: &str = "BastionFactory";

/// EIP-712 domain version of the factory.
pub const DEFAULT_EIP712_VERSION: &str = "0.0.0-beta";

/// Upper bound on session address derivation attempts.
pub const DEFAULT_MAX_DERIVATION_ATTEMPTS: usize = 10;

/// 0.001 ETH in wei.
pub const DEFAULT_MIN_ACTIVATION_BALANCE: u64 = 1_000_000_000_000_000;

/// Settings shared by every protocol run against one factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolConfig {
    /// The factory contract: EIP-712 verifying contract and allowance spender.
    pub factory: Address,

    /// The origin the session may be used from.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,

    /// EIP-712 domain name.
    #[serde(default = "default_eip712_name")]
    pub eip712_name: String,

    /// EIP-712 domain version.
    #[serde(default = "default_eip712_version")]
    pub eip712_version: String,

    /// Maximum salt attempts before derivation gives up.
    #[serde(default = "default_max_derivation_attempts")]
    pub max_derivation_attempts: usize,

    /// Minimum operator balance, in wei, required to send the activation.
    #[serde(default = "default_min_activation_balance")]
    pub min_activation_balance: U256,

    /// Delay between receipt polls, in milliseconds.
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,

    /// Time after which an unconfirmed transaction is reported failed, in
    /// milliseconds.
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,
}

fn default_allowed_origin() -> String {
    DEFAULT_ALLOWED_ORIGIN.to_string()
}

fn default_eip712_name() -> String {
    DEFAULT_EIP712_NAME.to_string()
}

fn default_eip712_version() -> String {
    DEFAULT_EIP712_VERSION.to_string()
}

const fn default_max_derivation_attempts() -> usize {
    DEFAULT_MAX_DERIVATION_ATTEMPTS
}

fn default_min_activation_balance() -> U256 {
    U256::from(DEFAULT_MIN_ACTIVATION_BALANCE)
}

const fn default_receipt_poll_interval_ms() -> u64 {
    2_000
}

const fn default_receipt_timeout_ms() -> u64 {
    120_000
}

impl ProtocolConfig {
    /// Creates a configuration for `factory` with every other field at its
    /// default.
    #[must_use]
    pub fn new(factory: Address) -> Self {
        Self {
            factory,
            allowed_origin: default_allowed_origin(),
            eip712_name: default_eip712_name(),
            eip712_version: default_eip712_version(),
            max_derivation_attempts: default_max_derivation_attempts(),
            min_activation_balance: default_min_activation_balance(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_timeout_ms: default_receipt_timeout_ms(),
        }
    }

    /// Replaces the allowed origin.
    #[must_use]
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    /// Returns the receipt poll interval.
    #[must_use]
    pub const fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    /// Returns the receipt timeout.
    #[must_use]
    pub const fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    /// Checks the configuration for values no run could succeed with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero factory address, an empty origin
    /// or zero derivation attempts.
    pub fn validate(&self) -> Result<()> {
        if self.factory.is_zero() {
            return Err(Error::Config("factory address is zero".to_string()));
        }
        if self.allowed_origin.is_empty() {
            return Err(Error::Config("allowed origin is empty".to_string()));
        }
        if self.max_derivation_attempts == 0 {
            return Err(Error::Config(
                "max derivation attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The kind of wallet that holds the owner key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletKind {
    /// A private key held by this process.
    #[default]
    Local,
    /// A browser-extension style EIP-1193 provider that prompts for accounts.
    Injected,
    /// An embedded wallet whose accounts are already unlocked.
    Embedded,
    /// A custody service reached over JSON-RPC.
    RemoteCustody,
}

impl WalletKind {
    /// Returns the configuration name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Injected => "injected",
            Self::Embedded => "embedded",
            Self::RemoteCustody => "remote-custody",
        }
    }

    /// Returns the JSON-RPC method that lists the wallet's accounts.
    #[must_use]
    pub const fn accounts_method(&self) -> &'static str {
        match self {
            Self::Injected => "eth_requestAccounts",
            Self::Local | Self::Embedded | Self::RemoteCustody => "eth_accounts",
        }
    }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "injected" => Ok(Self::Injected),
            "embedded" => Ok(Self::Embedded),
            "remote-custody" | "remote_custody" | "custody" => Ok(Self::RemoteCustody),
            other => Err(Error::Config(format!("unknown wallet kind: {other}"))),
        }
    }
}

/// How to reach the owner's wallet.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletConfig {
    /// The backend kind.
    pub kind: WalletKind,

    /// JSON-RPC endpoint of an EIP-1193 wallet. Unused for [`WalletKind::Local`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Hex private key of a [`WalletKind::Local`] wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

impl WalletConfig {
    /// Checks that the fields the backend needs are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a local wallet has no key, or a provider
    /// wallet has no endpoint.
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            WalletKind::Local if self.private_key.is_none() => Err(Error::Config(
                "local wallet requires a private key".to_string(),
            )),
            WalletKind::Injected | WalletKind::Embedded | WalletKind::RemoteCustody
                if self.endpoint.is_none() =>
            {
                Err(Error::Config(format!(
                    "{} wallet requires an endpoint",
                    self.kind
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletConfig")
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
