//! The `(v, r, s)` signature triple.
//!
//! Wallets return a 65-byte `r || s || v` signature over the approval digest.
//! The same triple is read two ways:
//!
//! - as an Ethereum ECDSA signature with `v ∈ {27, 28}`, which is what the
//!   factory's `getBastionAddress` and `checkSig` take
//! - as an EIP-7702 authorization signature with `y_parity = v - 27`
//!
//! Some wallets emit a raw recovery id (`0`/`1`) in the last byte. Parsing
//! normalizes it by adding 27, so a [`Signature`] always holds `v ≥ 27`.
//!
//! # Example
//!
//! ```
//! use bastion_core::Signature;
//!
//! let mut bytes = [0u8; 65];
//! bytes[64] = 1;
//! let sig = Signature::from_bytes(&bytes).unwrap();
//!
//! assert_eq!(sig.v(), 28);
//! assert!(sig.y_parity().unwrap());
//! ```

use core::fmt;

use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An Ethereum ECDSA signature with a normalized recovery parameter.
///
/// # Wire Format
///
/// 65 bytes: `r (32 bytes) || s (32 bytes) || v (1 byte)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    r: B256,
    s: B256,
    /// At least 27.
    v: u8,
}

impl Signature {
    /// The length of a serialized signature in bytes.
    pub const BYTE_LEN: usize = 65;

    /// Offset added to a raw recovery id.
    pub const V_OFFSET: u8 = 27;

    /// Creates a signature from its components, normalizing `v`.
    ///
    /// A `v` below 27 is treated as a raw recovery id and gets 27 added.
    ///
    /// # Example
    ///
    /// ```
    /// use bastion_core::Signature;
    ///
    /// assert_eq!(Signature::new([1u8; 32], [2u8; 32], 0).v(), 27);
    /// assert_eq!(Signature::new([1u8; 32], [2u8; 32], 28).v(), 28);
    /// ```
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        let v = if v < Self::V_OFFSET {
            v + Self::V_OFFSET
        } else {
            v
        };
        Self {
            r: B256::new(r),
            s: B256::new(s),
            v,
        }
    }

    /// Splits a 65-byte wallet signature into `(v, r, s)`.
    ///
    /// Bytes `0..32` are `r`, `32..64` are `s`, and byte `64` is the raw `v`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if the slice is not exactly 65 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(Error::InvalidSignature(format!(
                "expected {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            )));
        }

        let (words, v) = bytes.split_at(64);
        Ok(Self {
            r: B256::from_slice(&words[..32]),
            s: B256::from_slice(&words[32..]),
            v: v[0],
        }
        .normalized())
    }

    const fn normalized(self) -> Self {
        self.with_v(self.v)
    }

    /// Serializes the signature to `r || s || v` with the normalized `v`.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0u8; Self::BYTE_LEN];
        bytes[..32].copy_from_slice(self.r.as_slice());
        bytes[32..64].copy_from_slice(self.s.as_slice());
        bytes[64] = self.v;
        bytes
    }

    /// Big-endian `r`.
    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r.0
    }

    /// Big-endian `s`.
    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s.0
    }

    /// Returns the normalized recovery parameter.
    #[must_use]
    pub const fn v(&self) -> u8 {
        self.v
    }

    /// Returns R as a `bytes32` word.
    #[must_use]
    pub const fn r_b256(&self) -> B256 {
        self.r
    }

    /// Returns S as a `bytes32` word.
    #[must_use]
    pub const fn s_b256(&self) -> B256 {
        self.s
    }

    /// Returns R as a [`U256`].
    #[must_use]
    pub const fn r_u256(&self) -> U256 {
        U256::from_be_bytes(self.r.0)
    }

    /// Returns S as a [`U256`].
    #[must_use]
    pub const fn s_u256(&self) -> U256 {
        U256::from_be_bytes(self.s.0)
    }

    /// Returns the EIP-7702 `y_parity` (`v - 27`) as a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if `v` is neither 27 nor 28.
    pub fn y_parity(&self) -> Result<bool> {
        match self.v {
            27 => Ok(false),
            28 => Ok(true),
            v => Err(Error::InvalidSignature(format!(
                "recovery parameter {v} is not 27 or 28"
            ))),
        }
    }

    /// Returns a copy with a different recovery parameter.
    ///
    /// Used to express the same `(r, s)` for the other curve point.
    #[must_use]
    pub const fn with_v(&self, v: u8) -> Self {
        Self::new(self.r.0, self.s.0, v)
    }

    /// `0x`-prefixed hex of [`Self::to_bytes`].
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Parses the hex a wallet returns from `eth_signTypedData_v4`.
    ///
    /// # Errors
    ///
    /// [`Error::HexDecodeFailed`] for bad hex, otherwise as [`Self::from_bytes`].
    pub fn from_hex(text: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(text.strip_prefix("0x").unwrap_or(text))?)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_bytes(v: u8) -> Vec<u8> {
        [[0x11u8; 32].as_slice(), &[0x22u8; 32], &[v]].concat()
    }

    #[test]
    fn split_components() {
        let sig = Signature::from_bytes(&wallet_bytes(27)).unwrap();

        assert_eq!(sig.r(), &[0x11; 32]);
        assert_eq!(sig.s(), &[0x22; 32]);
        assert_eq!(sig.v(), 27);
    }

    #[test]
    fn raw_recovery_id_is_normalized() {
        assert_eq!(Signature::from_bytes(&wallet_bytes(0)).unwrap().v(), 27);
        assert_eq!(Signature::from_bytes(&wallet_bytes(1)).unwrap().v(), 28);
        assert_eq!(Signature::from_bytes(&wallet_bytes(28)).unwrap().v(), 28);
    }

    #[test]
    fn wrong_length_is_rejected() {
        for len in [0, 64, 66] {
            let bytes = vec![0u8; len];
            assert!(matches!(
                Signature::from_bytes(&bytes),
                Err(Error::InvalidSignature(_))
            ));
        }
    }

    #[test]
    fn y_parity_follows_v() {
        assert!(!Signature::new([0; 32], [0; 32], 27).y_parity().unwrap());
        assert!(Signature::new([0; 32], [0; 32], 28).y_parity().unwrap());
        assert!(Signature::new([0; 32], [0; 32], 29).y_parity().is_err());
    }

    #[test]
    fn to_bytes_carries_normalized_v() {
        let sig = Signature::from_bytes(&wallet_bytes(1)).unwrap();
        assert_eq!(sig.to_bytes()[64], 28);
    }

    #[test]
    fn hex_without_prefix() {
        let sig = Signature::new([5u8; 32], [6u8; 32], 28);
        let hex = sig.to_hex();
        let parsed = Signature::from_hex(hex.strip_prefix("0x").unwrap()).unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn words() {
        let mut r = [0u8; 32];
        r[31] = 1;
        let sig = Signature::new(r, [0u8; 32], 27);

        assert_eq!(sig.r_u256(), U256::from(1));
        assert_eq!(sig.r_b256(), B256::new(r));
        assert_eq!(sig.s_b256(), B256::ZERO);
    }

    #[test]
    fn serde_uses_hex_words() {
        let sig = Signature::new([0xaa; 32], [0xbb; 32], 27);
        let json = serde_json::to_value(sig).unwrap();

        assert_eq!(json["r"], format!("0x{}", "aa".repeat(32)));
        assert_eq!(json["v"], 27);
        let back: Signature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
    }
}
