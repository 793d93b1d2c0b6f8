//! The approval record and its EIP-712 encoding.
//!
//! An [`Approval`] binds an operator to a spending limit on one token, a
//! hashed origin and a salt. The owner signs it as EIP-712 typed data under
//! the factory's domain:
//!
//! ```text
//! Approval(bytes operator,address token,uint256 amount,bytes32 domain,bytes32 salt)
//! ```
//!
//! `operator` is typed `bytes` and carries the 20-byte packed address, not a
//! padded `address` word.

use alloy_primitives::{B256, U256, keccak256};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::abi;
use crate::address::Address;
use crate::config::ProtocolConfig;
use crate::eip712::{Eip712Domain, TypedData};
use crate::error::Result;
use crate::units::{TOKEN_DECIMALS, parse_units};

/// The EIP-712 primary type of an approval.
pub const PRIMARY_TYPE: &str = "Approval";

/// A 32-byte approval salt.
///
/// The first salt of a run is random. Each retry derives the next salt as
/// `keccak256(previous)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(B256);

impl Salt {
    /// Draws a salt from the operating system's CSPRNG.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(B256::new(bytes))
    }

    /// Wraps a fixed salt.
    #[must_use]
    pub const fn from_b256(salt: B256) -> Self {
        Self(salt)
    }

    /// Returns the next salt in the retry chain.
    #[must_use]
    pub fn next(&self) -> Self {
        Self(keccak256(self.0))
    }

    /// Returns the raw word.
    #[must_use]
    pub const fn as_b256(&self) -> B256 {
        self.0
    }
}

/// The EIP-712 domain an approval is signed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalDomain {
    /// Domain name.
    pub name: String,
    /// Domain version.
    pub version: String,
    /// Chain the wallet is connected to.
    pub chain_id: u64,
    /// The factory.
    pub verifying_contract: Address,
}

impl ApprovalDomain {
    /// Builds the domain for `chain_id` from the factory configuration.
    #[must_use]
    pub fn new(config: &ProtocolConfig, chain_id: u64) -> Self {
        Self {
            name: config.eip712_name.clone(),
            version: config.eip712_version.clone(),
            chain_id,
            verifying_contract: config.factory,
        }
    }

    /// Returns the generic EIP-712 domain.
    #[must_use]
    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain {
            name: Some(self.name.clone()),
            version: Some(self.version.clone()),
            chain_id: Some(self.chain_id),
            verifying_contract: Some(self.verifying_contract),
            salt: None,
        }
    }
}

/// The approval record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// The operator, encoded as packed bytes on the wire.
    pub operator: Address,
    /// The ERC-20 the session may spend.
    pub token: Address,
    /// Spending limit in base units. Always positive.
    pub amount: U256,
    /// `keccak256` of the allowed origin.
    pub domain: B256,
    /// Collision-avoidance salt.
    pub salt: Salt,
}

impl Approval {
    /// Returns the record as EIP-712 typed data under `domain`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the fixed schema fails to parse, which
    /// indicates a bug.
    pub fn typed_data(&self, domain: &ApprovalDomain) -> Result<TypedData> {
        let types = json!({
            PRIMARY_TYPE: [
                {"name": "operator", "type": "bytes"},
                {"name": "token", "type": "address"},
                {"name": "amount", "type": "uint256"},
                {"name": "domain", "type": "bytes32"},
                {"name": "salt", "type": "bytes32"}
            ]
        });
        let message = json!({
            "operator": format!("0x{}", hex::encode(self.operator.packed())),
            "token": self.token.to_checksum_hex(),
            "amount": self.amount.to_string(),
            "domain": format!("0x{}", hex::encode(self.domain)),
            "salt": format!("0x{}", hex::encode(self.salt.as_b256())),
        });

        TypedData::new(domain.to_eip712(), &types, PRIMARY_TYPE, message)
    }

    /// Computes the EIP-712 digest the owner signs.
    ///
    /// # Errors
    ///
    /// See [`Approval::typed_data`].
    pub fn digest(&self, domain: &ApprovalDomain) -> Result<B256> {
        self.typed_data(domain)?.signing_hash()
    }

    /// Returns the ABI form passed to `getDigest` and `checkSig`.
    #[must_use]
    pub fn to_abi(&self) -> abi::Approval {
        abi::Approval {
            operator: self.operator.packed().into(),
            token: self.token.inner(),
            amount: self.amount,
            domain: self.domain,
            salt: self.salt.as_b256(),
        }
    }
}

/// Hashes an origin string into the approval's `domain` field.
#[must_use]
pub fn origin_hash(origin: &str) -> B256 {
    keccak256(origin.as_bytes())
}

/// Validated approval inputs, reusable across salt attempts.
///
/// # Example
///
/// ```
/// use bastion_core::approval::{ApprovalBuilder, Salt};
/// use bastion_core::Address;
///
/// let builder = ApprovalBuilder::new(
///     Address::new([0x11; 20]),
///     "0x0000000000000000000000000000000000000002",
///     "100",
///     "https://dashboard.zerodev.app",
/// )
/// .unwrap();
///
/// let first = builder.build(Salt::random());
/// let second = builder.build(first.salt.next());
/// assert_eq!(first.amount, second.amount);
/// assert_ne!(first.salt, second.salt);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalBuilder {
    operator: Address,
    token: Address,
    amount: U256,
    domain: B256,
}

impl ApprovalBuilder {
    /// Validates the user inputs.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidAddress`] for a malformed token, or
    /// [`crate::Error::InvalidAmount`] for an amount that is not a positive
    /// decimal.
    pub fn new(operator: Address, token: &str, amount: &str, origin: &str) -> Result<Self> {
        let token = Address::parse(token)?;
        let amount = parse_units(amount, TOKEN_DECIMALS)?;
        Ok(Self {
            operator,
            token,
            amount,
            domain: origin_hash(origin),
        })
    }

    /// Returns the scaled amount.
    #[must_use]
    pub const fn amount(&self) -> U256 {
        self.amount
    }

    /// Returns the token.
    #[must_use]
    pub const fn token(&self) -> Address {
        self.token
    }

    /// Builds the record for one salt.
    #[must_use]
    pub fn build(&self, salt: Salt) -> Approval {
        Approval {
            operator: self.operator,
            token: self.token,
            amount: self.amount,
            domain: self.domain,
            salt,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::{SolStruct, eip712_domain};

    use super::*;
    use crate::error::Error;

    const TOKEN: &str = "0x0000000000000000000000000000000000000002";

    fn domain() -> ApprovalDomain {
        ApprovalDomain::new(&ProtocolConfig::new(Address::new([0xfa; 20])), 11_155_111)
    }

    fn approval() -> Approval {
        ApprovalBuilder::new(
            Address::new([0x11; 20]),
            TOKEN,
            "100",
            "https://dashboard.zerodev.app",
        )
        .unwrap()
        .build(Salt::from_b256(B256::repeat_byte(0x5a)))
    }

    #[test]
    fn amount_scaled_by_eighteen_decimals() {
        assert_eq!(
            approval().amount,
            U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64))
        );
    }

    #[test]
    fn invalid_inputs() {
        let operator = Address::new([0x11; 20]);
        assert!(matches!(
            ApprovalBuilder::new(operator, "0x1234", "1", "o"),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            ApprovalBuilder::new(operator, TOKEN, "0", "o"),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn origin_is_hashed() {
        assert_eq!(
            approval().domain,
            keccak256("https://dashboard.zerodev.app".as_bytes())
        );
    }

    #[test]
    fn salt_chain_is_deterministic() {
        let seed = Salt::from_b256(B256::repeat_byte(0x01));
        let mut current = seed;
        let mut seen = vec![seed];
        for _ in 0..10 {
            let next = current.next();
            assert_eq!(next.as_b256(), keccak256(current.as_b256()));
            assert!(!seen.contains(&next));
            seen.push(next);
            current = next;
        }
        assert_eq!(seed.next(), Salt::from_b256(keccak256(B256::repeat_byte(0x01))));
    }

    #[test]
    fn random_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn type_string() {
        let typed = approval().typed_data(&domain()).unwrap();
        assert_eq!(
            typed.encode_type(PRIMARY_TYPE).unwrap(),
            "Approval(bytes operator,address token,uint256 amount,bytes32 domain,bytes32 salt)"
        );
    }

    #[test]
    fn digest_matches_sol_struct_hash() {
        let approval = approval();
        let domain = domain();
        let sol_domain = eip712_domain! {
            name: "BastionFactory",
            version: "0.0.0-beta",
            chain_id: 11_155_111,
            verifying_contract: alloy_primitives::Address::repeat_byte(0xfa),
        };

        assert_eq!(
            approval.digest(&domain).unwrap(),
            approval.to_abi().eip712_signing_hash(&sol_domain)
        );
    }

    #[test]
    fn tampered_amount_changes_digest() {
        let domain = domain();
        let original = approval();
        let mut tampered = original.clone();
        tampered.amount += U256::from(1u8);

        assert_ne!(
            original.digest(&domain).unwrap(),
            tampered.digest(&domain).unwrap()
        );
    }

    #[test]
    fn abi_form_packs_operator() {
        assert_eq!(approval().to_abi().operator.as_ref(), &[0x11; 20]);
    }
}
