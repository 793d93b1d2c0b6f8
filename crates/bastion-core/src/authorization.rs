//! EIP-7702 code delegation authorizations.
//!
//! An authorization tuple `{chain_id, address, nonce}` lets the account that
//! signed it run the code at `address`. Its signing hash is
//!
//! ```text
//! keccak256(0x05 || rlp([chain_id, address, nonce]))
//! ```
//!
//! A session account never holds a private key of its own. Its address is
//! whatever account recovers from the owner's approval signature when that
//! signature is read as an authorization, so [`SignedAuthorization`] is built
//! from the approval's `(v, r, s)` unchanged.
//!
//! [EIP-7702]: https://eips.ethereum.org/EIPS/eip-7702

use alloy_primitives::{B256, U256, keccak256};
use alloy_rlp::{BufMut, Encodable, Header};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::crypto::recover_address;
use crate::error::Result;
use crate::signature::Signature;

/// The EIP-7702 authorization magic byte.
pub const AUTHORIZATION_MAGIC: u8 = 0x05;

/// An unsigned authorization tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Chain the delegation is valid on.
    pub chain_id: u64,
    /// The implementation the authority delegates to.
    pub address: Address,
    /// The authority's account nonce.
    pub nonce: u64,
}

impl Authorization {
    /// Creates a nonce-0 authorization, the only kind a fresh session uses.
    #[must_use]
    pub const fn first(chain_id: u64, implementation: Address) -> Self {
        Self {
            chain_id,
            address: implementation,
            nonce: 0,
        }
    }

    fn fields_length(&self) -> usize {
        self.chain_id.length() + self.address.inner().length() + self.nonce.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.address.inner().encode(out);
        self.nonce.encode(out);
    }

    /// Computes the signing hash.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let header = Header {
            list: true,
            payload_length: self.fields_length(),
        };

        let mut buf = Vec::with_capacity(1 + header.length() + header.payload_length);
        buf.push(AUTHORIZATION_MAGIC);
        header.encode(&mut buf);
        self.encode_fields(&mut buf);

        keccak256(&buf)
    }

    /// Attaches a signature.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidSignature`] if `v` is not 27 or 28.
    pub fn into_signed(self, signature: &Signature) -> Result<SignedAuthorization> {
        Ok(SignedAuthorization {
            inner: self,
            y_parity: u8::from(signature.y_parity()?),
            r: signature.r_u256(),
            s: signature.s_u256(),
        })
    }
}

/// An authorization with its `(y_parity, r, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedAuthorization {
    /// The tuple that was signed.
    #[serde(flatten)]
    pub inner: Authorization,
    /// `v - 27`.
    pub y_parity: u8,
    /// Signature R.
    pub r: U256,
    /// Signature S.
    pub s: U256,
}

impl SignedAuthorization {
    /// Returns the signature in `(v, r, s)` form.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature::new(
            self.r.to_be_bytes::<32>(),
            self.s.to_be_bytes::<32>(),
            self.y_parity,
        )
    }

    /// Recovers the account that granted this authorization.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidSignature`] if nothing recovers.
    pub fn authority(&self) -> Result<Address> {
        recover_address(&self.inner.signing_hash(), &self.signature())
    }

    fn fields_length(&self) -> usize {
        self.inner.fields_length() + self.y_parity.length() + self.r.length() + self.s.length()
    }

    /// Returns the tuple as it appears in a transaction's JSON-RPC
    /// `authorizationList`.
    #[must_use]
    pub fn to_rpc_value(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": format!("{:#x}", self.inner.chain_id),
            "address": self.inner.address.to_hex(),
            "nonce": format!("{:#x}", self.inner.nonce),
            "yParity": format!("{:#x}", self.y_parity),
            "r": format!("{:#x}", self.r),
            "s": format!("{:#x}", self.s),
        })
    }
}

impl Encodable for SignedAuthorization {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.fields_length(),
        }
        .encode(out);
        self.inner.encode_fields(out);
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_length();
        Header {
            list: true,
            payload_length,
        }
        .length()
            + payload_length
    }
}

/// Recovers the account that `signature` authorizes to delegate to
/// `implementation` on `chain_id` at nonce 0.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidSignature`] if nothing recovers.
pub fn authorization_signer(
    signature: &Signature,
    chain_id: u64,
    implementation: Address,
) -> Result<Address> {
    Authorization::first(chain_id, implementation)
        .into_signed(signature)?
        .authority()
}
