//! Typed transaction encoding for locally signed transactions.
//!
//! Two envelope types are supported:
//!
//! - **EIP-1559** (type `0x02`): owner writes such as `approve` and
//!   `changeOperator` when the owner key is local
//! - **EIP-7702** (type `0x04`): the activation call, which carries the
//!   session's delegation authorization
//!
//! # Signing Flow
//!
//! 1. Fill a [`TypedTransaction`]
//! 2. Sign [`TypedTransaction::signing_hash`] with the sender key
//! 3. Submit [`TypedTransaction::signed_rlp`] through `eth_sendRawTransaction`
//!
//! # Example
//!
//! ```
//! use bastion_core::{Address, Eip1559Transaction, TypedTransaction};
//! use alloy_primitives::U256;
//!
//! let tx = TypedTransaction::Eip1559(Eip1559Transaction {
//!     chain_id: 1,
//!     nonce: 0,
//!     max_priority_fee_per_gas: U256::from(1_000_000_000u64),
//!     max_fee_per_gas: U256::from(100_000_000_000u64),
//!     gas_limit: 21_000,
//!     to: Address::zero(),
//!     value: U256::from(1u8),
//!     data: vec![],
//! });
//!
//! let hash = tx.signing_hash();
//! ```

use alloy_primitives::{B256, U256, keccak256};
use alloy_rlp::{BufMut, Encodable, Header};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::authorization::SignedAuthorization;
use crate::error::{Error, Result};
use crate::signature::Signature;

/// An EIP-1559 (type 2) transaction with an empty access list.
///
/// [EIP-1559]: https://eips.ethereum.org/EIPS/eip-1559
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip1559Transaction {
    /// The chain ID.
    pub chain_id: u64,

    /// The sender nonce.
    pub nonce: u64,

    /// The maximum priority fee per gas (tip).
    pub max_priority_fee_per_gas: U256,

    /// The maximum total fee per gas.
    pub max_fee_per_gas: U256,

    /// The gas limit.
    pub gas_limit: u64,

    /// The recipient.
    pub to: Address,

    /// The value to transfer in wei.
    pub value: U256,

    /// The call data.
    pub data: Vec<u8>,
}

impl Eip1559Transaction {
    /// The transaction type identifier for EIP-1559.
    pub const TX_TYPE: u8 = 0x02;

    fn fields_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.inner().length()
            + self.value.length()
            + self.data.as_slice().length()
            + EMPTY_LIST.len()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        self.to.inner().encode(out);
        self.value.encode(out);
        self.data.as_slice().encode(out);
        out.put_slice(&EMPTY_LIST);
    }
}

/// An EIP-7702 (type 4) set-code transaction with an empty access list.
///
/// [EIP-7702]: https://eips.ethereum.org/EIPS/eip-7702
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip7702Transaction {
    /// The EIP-1559 fields. `to` must be a real account; EIP-7702 has no
    /// contract creation form.
    #[serde(flatten)]
    pub base: Eip1559Transaction,

    /// Delegations applied before the call executes.
    pub authorization_list: Vec<SignedAuthorization>,
}

impl Eip7702Transaction {
    /// The transaction type identifier for EIP-7702.
    pub const TX_TYPE: u8 = 0x04;

    fn authorization_payload_length(&self) -> usize {
        self.authorization_list.iter().map(Encodable::length).sum()
    }

    fn fields_length(&self) -> usize {
        let auth_payload = self.authorization_payload_length();
        self.base.fields_length()
            + Header {
                list: true,
                payload_length: auth_payload,
            }
            .length()
            + auth_payload
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.base.encode_fields(out);
        Header {
            list: true,
            payload_length: self.authorization_payload_length(),
        }
        .encode(out);
        for authorization in &self.authorization_list {
            authorization.encode(out);
        }
    }
}

/// `rlp([])`, the empty access list.
const EMPTY_LIST: [u8; 1] = [0xc0];

/// A transaction envelope this crate can sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TypedTransaction {
    /// EIP-1559 (type 2) transaction.
    #[serde(rename = "eip1559")]
    Eip1559(Eip1559Transaction),
    /// EIP-7702 (type 4) transaction.
    #[serde(rename = "eip7702")]
    Eip7702(Eip7702Transaction),
}

impl TypedTransaction {
    /// Returns the envelope type byte.
    #[must_use]
    pub const fn tx_type(&self) -> u8 {
        match self {
            Self::Eip1559(_) => Eip1559Transaction::TX_TYPE,
            Self::Eip7702(_) => Eip7702Transaction::TX_TYPE,
        }
    }

    /// Returns the EIP-1559 fields shared by both envelopes.
    #[must_use]
    pub const fn base(&self) -> &Eip1559Transaction {
        match self {
            Self::Eip1559(tx) => tx,
            Self::Eip7702(tx) => &tx.base,
        }
    }

    fn fields_length(&self) -> usize {
        match self {
            Self::Eip1559(tx) => tx.fields_length(),
            Self::Eip7702(tx) => tx.fields_length(),
        }
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        match self {
            Self::Eip1559(tx) => tx.encode_fields(out),
            Self::Eip7702(tx) => tx.encode_fields(out),
        }
    }

    /// Computes `keccak256(type || rlp([fields...]))`.
    #[must_use]
    pub fn signing_hash(&self) -> B256 {
        let payload_length = self.fields_length();
        let mut buf = Vec::with_capacity(1 + 9 + payload_length);
        buf.push(self.tx_type());
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut buf);
        self.encode_fields(&mut buf);

        keccak256(&buf)
    }

    /// Encodes the signed envelope `type || rlp([fields..., y_parity, r, s])`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSignature`] if `v` is not 27 or 28.
    pub fn signed_rlp(&self, signature: &Signature) -> Result<Vec<u8>> {
        let y_parity = signature.y_parity()?;
        let r = signature.r_u256();
        let s = signature.s_u256();

        let payload_length = self.fields_length() + y_parity.length() + r.length() + s.length();
        let mut buf = Vec::with_capacity(1 + 9 + payload_length);
        buf.push(self.tx_type());
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut buf);
        self.encode_fields(&mut buf);
        y_parity.encode(&mut buf);
        r.encode(&mut buf);
        s.encode(&mut buf);

        Ok(buf)
    }

    /// Returns the hash a node reports for the signed envelope.
    ///
    /// # Errors
    ///
    /// See [`TypedTransaction::signed_rlp`].
    pub fn transaction_hash(&self, signature: &Signature) -> Result<B256> {
        Ok(keccak256(self.signed_rlp(signature)?))
    }

    /// Parses a transaction from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use alloy_rlp::Decodable;

    use super::*;
    use crate::authorization::Authorization;
    use crate::crypto::Keypair;

    fn base() -> Eip1559Transaction {
        Eip1559Transaction {
            chain_id: 11_155_111,
            nonce: 3,
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            max_fee_per_gas: U256::from(30_000_000_000u64),
            gas_limit: 100_000,
            to: Address::new([0xfa; 20]),
            value: U256::ZERO,
            data: vec![0xde, 0xad, 0xbe, 0xef],
        }
    }

    fn authorization() -> SignedAuthorization {
        SignedAuthorization {
            inner: Authorization::first(11_155_111, Address::new([0x1e; 20])),
            y_parity: 1,
            r: U256::from(5u8),
            s: U256::from(6u8),
        }
    }

    #[test]
    fn signed_envelopes_are_well_formed_lists() {
        let key = Keypair::generate();
        for tx in [
            TypedTransaction::Eip1559(base()),
            TypedTransaction::Eip7702(Eip7702Transaction {
                base: base(),
                authorization_list: vec![authorization()],
            }),
        ] {
            let sig = key.sign_prehash(&tx.signing_hash()).unwrap();
            let raw = tx.signed_rlp(&sig).unwrap();

            assert_eq!(raw[0], tx.tx_type());
            let mut body = &raw[1..];
            let header = Header::decode(&mut body).unwrap();
            assert!(header.list);
            assert_eq!(header.payload_length, body.len());
        }
    }

    #[test]
    fn eip7702_fields_extend_eip1559() {
        let plain = TypedTransaction::Eip1559(base());
        let set_code = TypedTransaction::Eip7702(Eip7702Transaction {
            base: base(),
            authorization_list: vec![authorization()],
        });

        assert_ne!(plain.signing_hash(), set_code.signing_hash());
        assert_eq!(
            set_code.fields_length(),
            plain.fields_length() + 1 + authorization().length()
        );
    }

    #[test]
    fn empty_authorization_list_encodes_as_empty_list() {
        let tx = Eip7702Transaction {
            base: base(),
            authorization_list: vec![],
        };
        let mut out = Vec::new();
        tx.encode_fields(&mut out);
        assert_eq!(out.last(), Some(&0xc0));
    }

    #[test]
    fn transaction_hash_depends_on_signature() {
        let tx = TypedTransaction::Eip1559(base());
        let a = Keypair::generate().sign_prehash(&tx.signing_hash()).unwrap();
        let b = Keypair::generate().sign_prehash(&tx.signing_hash()).unwrap();

        assert_ne!(
            tx.transaction_hash(&a).unwrap(),
            tx.transaction_hash(&b).unwrap()
        );
    }

    #[test]
    fn json_roundtrip() {
        let tx = TypedTransaction::Eip7702(Eip7702Transaction {
            base: base(),
            authorization_list: vec![authorization()],
        });
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(TypedTransaction::from_json(&json).unwrap(), tx);
    }
}
