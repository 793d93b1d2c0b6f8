//! Ethereum addresses and their two encodings in the approval protocol.
//!
//! An operator address appears twice in the protocol: as an ABI/EIP-712
//! `address` (left-padded to 32 bytes) when it is a token or signer, and as
//! raw `bytes` (the 20-byte `encodePacked` form) when it is the operator
//! field of an approval or the argument to `changeOperator`. [`Address::packed`]
//! and [`Address::from_packed`] handle the second form.
//!
//! Addresses are derived from secp256k1 public keys the standard way:
//!
//! 1. Take the uncompressed public key (65 bytes: `0x04 || x || y`)
//! 2. Remove the `0x04` prefix to get 64 bytes (`x || y`)
//! 3. Compute the Keccak-256 hash of the 64 bytes
//! 4. Take the last 20 bytes of the hash as the address
//!
//! # Example
//!
//! ```
//! use bastion_core::Address;
//!
//! let addr = Address::parse("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
//! assert_eq!(addr.packed().len(), 20);
//! ```

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address as AlloyAddress, keccak256};
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An Ethereum address (20 bytes).
///
/// This is a wrapper around [`alloy_primitives::Address`]. Equality is
/// byte equality, so comparisons are insensitive to the hex casing the
/// address was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(AlloyAddress);

impl Address {
    /// The length of an Ethereum address in bytes.
    pub const BYTE_LEN: usize = 20;

    /// Creates a new address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; Self::BYTE_LEN]) -> Self {
        Self(AlloyAddress::new(bytes))
    }

    /// Returns the zero address (`0x0000...0000`).
    ///
    /// The factory reports a failed session derivation as the zero address.
    #[must_use]
    pub const fn zero() -> Self {
        Self(AlloyAddress::ZERO)
    }

    /// Checks if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Derives the Ethereum address of a secp256k1 public key.
    #[must_use]
    pub fn from_verifying_key(public_key: &VerifyingKey) -> Self {
        let encoded = public_key.to_encoded_point(false);
        // Drop the 0x04 SEC1 tag.
        let hash = keccak256(&encoded.as_bytes()[1..]);

        let mut address_bytes = [0u8; Self::BYTE_LEN];
        address_bytes.copy_from_slice(&hash[12..]);
        Self::new(address_bytes)
    }

    /// Parses a canonical address string.
    ///
    /// The input must be `0x` followed by exactly 40 hex digits. All-lowercase
    /// and all-uppercase inputs are accepted as is. Mixed-case input must
    /// carry a valid [EIP-55] checksum.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the prefix, length, digits or
    /// checksum are wrong.
    ///
    /// # Example
    ///
    /// ```
    /// use bastion_core::Address;
    ///
    /// assert!(Address::parse("0x0000000000000000000000000000000000000001").is_ok());
    /// // Bad checksum
    /// assert!(Address::parse("0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed").is_err());
    /// // Missing prefix
    /// assert!(Address::parse("0000000000000000000000000000000000000001").is_err());
    /// ```
    ///
    /// [EIP-55]: https://eips.ethereum.org/EIPS/eip-55
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .ok_or_else(|| Error::InvalidAddress(format!("{trimmed}: missing 0x prefix")))?;

        if digits.len() != 2 * Self::BYTE_LEN || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidAddress(format!(
                "{trimmed}: expected 40 hex digits"
            )));
        }

        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper {
            return AlloyAddress::parse_checksummed(trimmed, None)
                .map(Self)
                .map_err(|_| Error::InvalidAddress(format!("{trimmed}: bad EIP-55 checksum")));
        }

        let bytes = hex::decode(digits)?;
        Ok(Self(AlloyAddress::from_slice(&bytes)))
    }

    /// Encodes the address as raw `bytes`, the 20-byte `encodePacked` form.
    ///
    /// This is the encoding of the approval's `operator` field and the
    /// argument of `changeOperator`.
    #[must_use]
    pub fn packed(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Decodes an address from its packed `bytes` form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `bytes` is not exactly 20 bytes.
    pub fn from_packed(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::BYTE_LEN {
            return Err(Error::InvalidAddress(format!(
                "packed address must be {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            )));
        }
        Ok(Self(AlloyAddress::from_slice(bytes)))
    }

    /// Returns the [`Address`] as a byte slice.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::BYTE_LEN] {
        &self.0.0.0
    }

    /// Returns the [`Address`] as a checksummed hex string.
    #[must_use]
    pub fn to_checksum_hex(&self) -> String {
        self.0.to_checksum(None)
    }

    /// Returns the [`Address`] as a lowercase hex string with `0x` prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.as_bytes()))
    }

    /// Returns the inner [`alloy_primitives::Address`].
    #[must_use]
    pub const fn inner(&self) -> AlloyAddress {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum_hex())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<AlloyAddress> for Address {
    fn from(addr: AlloyAddress) -> Self {
        Self(addr)
    }
}

impl From<Address> for AlloyAddress {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use k256::ecdsa::SigningKey;

    use super::*;

    const CHECKSUMMED: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    #[test]
    fn address_zero() {
        let zero = Address::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.as_bytes(), &[0u8; 20]);
    }

    #[test]
    fn parse_accepts_checksummed_and_single_case() {
        let mixed = Address::parse(CHECKSUMMED).unwrap();
        let lower = Address::parse(&CHECKSUMMED.to_lowercase()).unwrap();
        let upper = Address::parse(&format!("0x{}", CHECKSUMMED[2..].to_uppercase())).unwrap();

        assert_eq!(mixed, lower);
        assert_eq!(mixed, upper);
        assert_eq!(mixed.to_checksum_hex(), CHECKSUMMED);
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        // Flip the case of one letter.
        let broken = CHECKSUMMED.replacen('a', "A", 1);
        assert!(matches!(
            Address::parse(&broken),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for input in [
            "",
            "0x",
            "0x1234",
            "5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xZZAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed00",
        ] {
            assert!(
                matches!(Address::parse(input), Err(Error::InvalidAddress(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn packed_is_raw_twenty_bytes() {
        let addr = Address::new([0xab; 20]);
        let packed = addr.packed();
        assert_eq!(packed, vec![0xab; 20]);
        assert_eq!(Address::from_packed(&packed).unwrap(), addr);
    }

    #[test]
    fn from_packed_rejects_padded_word() {
        let mut word = vec![0u8; 12];
        word.extend_from_slice(&[0xab; 20]);
        assert!(Address::from_packed(&word).is_err());
    }

    #[test]
    fn from_verifying_key_matches_known_vector() {
        // Private key 0x...01 controls the well-known address below.
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = SigningKey::from_bytes(&secret.into()).unwrap();
        let addr = Address::from_verifying_key(key.verifying_key());

        assert_eq!(
            addr,
            Address::parse("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").unwrap()
        );
    }

    #[test]
    fn address_display_is_checksummed() {
        let addr = Address::parse(&CHECKSUMMED.to_lowercase()).unwrap();
        assert_eq!(format!("{addr}"), CHECKSUMMED);
    }

    #[test]
    fn address_alloy_conversions() {
        let addr: Address = AlloyAddress::ZERO.into();
        assert!(addr.is_zero());
        let back: AlloyAddress = addr.into();
        assert!(back.is_zero());
    }
}
