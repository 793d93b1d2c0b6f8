//! secp256k1 keys, signing and signer recovery.
//!
//! This module provides:
//!
//! - [`Keypair`]: the ephemeral keypair that operates a session account
//! - [`recover_address`]: the Ethereum address that produced a signature over
//!   a 32-byte prehash
//!
//! Recovery works on prehashes only. Callers hash the EIP-712 payload or the
//! EIP-7702 authorization themselves and pass the digest in.
//!
//! # Example
//!
//! ```
//! use alloy_primitives::B256;
//! use bastion_core::crypto::{Keypair, recover_address};
//!
//! let key = Keypair::generate();
//! let digest = B256::repeat_byte(0x11);
//! let sig = key.sign_prehash(&digest).unwrap();
//!
//! assert_eq!(recover_address(&digest, &sig).unwrap(), key.address());
//! ```

use core::fmt;

use alloy_primitives::B256;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::address::Address;
use crate::error::{Error, Result};
use crate::signature::Signature;

/// A secp256k1 keypair held in memory.
///
/// Operator keys are generated fresh for every session and every rotation. The
/// private key leaves this type only through [`Keypair::private_key_hex`],
/// which the caller hands to the user. Nothing is persisted.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    address: Address,
}

impl Keypair {
    /// Generates a new key from the operating system's CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Loads a key from a 32-byte hex secret, optionally prefixed with `0x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] for bad hex, or
    /// [`Error::InvalidKey`] if the bytes are not a valid secp256k1 scalar.
    pub fn from_hex(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        let secret = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(secret)?;
        if bytes.len() != 32 {
            return Err(Error::InvalidKey(format!(
                "expected 32-byte secret, got {} bytes",
                bytes.len()
            )));
        }
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_verifying_key(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// Returns the Ethereum address controlled by this key.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the public key.
    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Returns the private key as `0x`-prefixed lowercase hex.
    #[must_use]
    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Signs a 32-byte prehash, returning a low-S signature with `v ∈ {27, 28}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if the signer fails.
    pub fn sign_prehash(&self, prehash: &B256) -> Result<Signature> {
        let (sig, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(prehash.as_slice())
            .map_err(|e| Error::InvalidSignature(e.to_string()))?;

        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(Signature::new(r, s, recovery_id.to_byte()))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Recovers the address that signed `prehash`.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if `v` is not 27 or 28, if `(r, s)`
/// are not valid scalars, or if no public key recovers.
pub fn recover_address(prehash: &B256, signature: &Signature) -> Result<Address> {
    let recovery_id = RecoveryId::try_from(u8::from(signature.y_parity()?))
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(signature.r());
    rs[32..].copy_from_slice(signature.s());
    let sig = K256Signature::from_slice(&rs)
        .map_err(|e| Error::InvalidSignature(format!("invalid signature scalars: {e}")))?;

    let verifying_key = VerifyingKey::recover_from_prehash(prehash.as_slice(), &sig, recovery_id)
        .map_err(|e| Error::InvalidSignature(format!("recovery failed: {e}")))?;

    Ok(Address::from_verifying_key(&verifying_key))
}
