//! Error types for the Bastion session client.
//!
//! [`enum@Error`] covers every way a protocol run can fail, from input
//! parsing through chain submission. Protocol entry points wrap it in a
//! [`RunError`] that records the [`Phase`] the failure originated in.
//!
//! # Error Categories
//!
//! - **Input errors**: token address and amount validation
//! - **Verification errors**: digest, signer and delegation cross-checks
//! - **Chain errors**: allowance updates, rotation, reverts and RPC failures
//! - **Encoding errors**: hex, JSON, ABI and EIP-712 payloads
//!
//! # Example
//!
//! ```
//! use bastion_core::Error;
//!
//! let err = Error::DerivationExhausted { attempts: 10 };
//! assert_eq!(
//!     err.to_string(),
//!     "session address derivation failed after 10 attempts"
//! );
//! ```

use core::result::Result as CoreResult;

use alloy_primitives::{B256, U256};
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

use crate::address::Address;
use crate::status::Phase;

/// The main error type for the Bastion session client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// The string is not a canonical `0x`-prefixed 20-byte address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The amount does not parse, or scales to zero or below.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    // =========================================================================
    // Verification Errors
    // =========================================================================
    /// The locally computed EIP-712 digest differs from the factory's.
    #[error("digest mismatch: local {local}, chain {chain}")]
    DigestMismatch {
        /// Digest computed by this client.
        local: B256,
        /// Digest returned by `getDigest`.
        chain: B256,
    },

    /// The approval signature does not recover to the connected account.
    #[error("recovered owner {recovered} does not match connected account {expected}")]
    SignerMismatch {
        /// The connected account.
        expected: Address,
        /// The address recovered from the signature.
        recovered: Address,
    },

    /// Every derivation attempt produced the zero address.
    #[error("session address derivation failed after {attempts} attempts")]
    DerivationExhausted {
        /// Number of attempts made.
        attempts: usize,
    },

    /// The delegation authorization does not recover to the session address.
    #[error(
        "delegation authorization recovers to {}, expected session {expected}",
        .recovered.map_or_else(|| "nothing".to_string(), |a| a.to_string())
    )]
    AuthorizationMismatch {
        /// The derived session address.
        expected: Address,
        /// The recovered authority, if recovery succeeded at all.
        recovered: Option<Address>,
    },

    // =========================================================================
    // Chain Errors
    // =========================================================================
    /// A step of the allowance settlement failed.
    #[error("allowance update failed: {0}")]
    AllowanceUpdateFailed(String),

    /// The caller is not the session account's controller.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Generic chain-submission failure.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// A call or transaction reverted.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The account that pays for activation does not hold enough native balance.
    #[error("balance {have} wei is below the required {need} wei")]
    InsufficientBalance {
        /// Current balance in wei.
        have: U256,
        /// Required balance in wei.
        need: U256,
    },

    // =========================================================================
    // Cryptographic Errors
    // =========================================================================
    /// The signature is malformed or cannot be recovered.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The private or public key is malformed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    // =========================================================================
    // EIP-712 Errors
    // =========================================================================
    /// The EIP-712 typed data is invalid.
    #[error("invalid EIP-712 typed data: {0}")]
    InvalidTypedData(String),

    /// A type referenced in the typed data is not defined.
    #[error("undefined type in EIP-712 data: {0}")]
    UndefinedType(String),

    // =========================================================================
    // Wallet and RPC Errors
    // =========================================================================
    /// The wallet backend refused or failed a request.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// A JSON-RPC endpoint answered with an error object.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The transport under the JSON-RPC client failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Contract return data could not be ABI-decoded.
    #[error("ABI decoding failed: {0}")]
    AbiDecodeFailed(String),
}

impl Error {
    /// Returns `true` if this error is a call or transaction revert.
    #[must_use]
    pub const fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted(_))
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::JsonError(err.to_string())
    }
}

impl From<alloy_sol_types::Error> for Error {
    fn from(err: alloy_sol_types::Error) -> Self {
        Error::AbiDecodeFailed(err.to_string())
    }
}

/// A specialized [`Result`] type for Bastion client operations.
pub type Result<T> = CoreResult<T, Error>;

/// An [`enum@Error`] tagged with the protocol phase it originated in.
///
/// Returned by the protocol entry points in [`crate::session`] so callers
/// can report where a run was aborted.
#[derive(Debug, Error)]
#[error("{phase}: {error}")]
pub struct RunError {
    /// The phase that was running when the error surfaced.
    pub phase: Phase,

    /// The underlying error.
    #[source]
    pub error: Error,
}

impl RunError {
    /// Tags `error` with `phase`.
    #[must_use]
    pub const fn new(phase: Phase, error: Error) -> Self {
        Self { phase, error }
    }
}

/// Extension for tagging a [`Result`] with its originating [`Phase`].
pub(crate) trait PhaseExt<T> {
    fn in_phase(self, phase: Phase) -> CoreResult<T, RunError>;
}

impl<T> PhaseExt<T> for Result<T> {
    fn in_phase(self, phase: Phase) -> CoreResult<T, RunError> {
        self.map_err(|error| RunError::new(phase, error))
    }
}
