//! EIP-712 typed structured data.
//!
//! [`TypedData`] is the payload handed to a wallet's `sign_typed_data`. It
//! hashes itself with [`TypedData::signing_hash`], which is the digest a
//! wallet signs and the digest the owner is recovered from. It also renders
//! the JSON document that `eth_signTypedData_v4` expects via
//! [`TypedData::to_rpc_value`].
//!
//! # Hash Computation
//!
//! ```text
//! keccak256("\x19\x01" || domainSeparator || hashStruct(message))
//! ```
//!
//! # Example
//!
//! ```
//! use bastion_core::{Address, Eip712Domain, TypedData};
//! use serde_json::json;
//!
//! let domain = Eip712Domain {
//!     name: Some("My DApp".to_string()),
//!     version: Some("1".to_string()),
//!     chain_id: Some(1),
//!     verifying_contract: Some(Address::zero()),
//!     salt: None,
//! };
//!
//! let types = json!({
//!     "Person": [
//!         {"name": "name", "type": "string"},
//!         {"name": "wallet", "type": "address"}
//!     ]
//! });
//! let message = json!({
//!     "name": "Alice",
//!     "wallet": "0x0000000000000000000000000000000000000001"
//! });
//!
//! let typed_data = TypedData::new(domain, &types, "Person", message).unwrap();
//! let hash = typed_data.signing_hash().unwrap();
//! ```
//!
//! [EIP-712]: https://eips.ethereum.org/EIPS/eip-712

use std::collections::BTreeMap;

use alloy_primitives::{B256, U256, keccak256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::address::Address;
use crate::error::{Error, Result};

/// The name of the implicit domain type.
const DOMAIN_TYPE: &str = "EIP712Domain";

/// The EIP-712 domain separator parameters.
///
/// Absent fields are omitted from both the domain type and its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Domain {
    /// The human-readable name of the signing domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The version of the signing domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The chain ID where signatures are valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,

    /// The address of the contract verifying the signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,

    /// A disambiguating salt for the protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salt: Option<B256>,
}

impl Eip712Domain {
    /// Returns the `EIP712Domain` fields present in this domain, in
    /// canonical order.
    #[must_use]
    pub fn fields(&self) -> Vec<TypeField> {
        let mut fields = Vec::with_capacity(5);
        if self.name.is_some() {
            fields.push(TypeField::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(TypeField::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(TypeField::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(TypeField::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(TypeField::new("salt", "bytes32"));
        }
        fields
    }

    /// Computes the domain separator hash.
    #[must_use]
    pub fn separator_hash(&self) -> B256 {
        let type_string = format!("{DOMAIN_TYPE}({})", join_fields(&self.fields()));

        let mut encoded = keccak256(type_string.as_bytes()).to_vec();
        if let Some(name) = &self.name {
            encoded.extend_from_slice(keccak256(name.as_bytes()).as_slice());
        }
        if let Some(version) = &self.version {
            encoded.extend_from_slice(keccak256(version.as_bytes()).as_slice());
        }
        if let Some(chain_id) = self.chain_id {
            encoded.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
        }
        if let Some(contract) = &self.verifying_contract {
            encoded.extend_from_slice(&address_word(contract));
        }
        if let Some(salt) = &self.salt {
            encoded.extend_from_slice(salt.as_slice());
        }

        keccak256(&encoded)
    }
}

/// A type field definition for EIP-712.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeField {
    /// The name of the field.
    pub name: String,

    /// The type of the field (e.g., "string", "uint256", "address").
    #[serde(rename = "type")]
    pub field_type: String,
}

impl TypeField {
    /// Creates a field definition.
    #[must_use]
    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
        }
    }
}

/// Typed structured data for EIP-712 signing.
///
/// `types` never contains `EIP712Domain`; the domain type is derived from
/// [`Eip712Domain::fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// The EIP-712 domain.
    pub domain: Eip712Domain,

    /// The struct type definitions, keyed by type name.
    pub types: BTreeMap<String, Vec<TypeField>>,

    /// The primary type being signed.
    pub primary_type: String,

    /// The message data.
    pub message: Value,
}

impl TypedData {
    /// Creates typed data from a JSON object of type definitions.
    ///
    /// An `EIP712Domain` entry in `types` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypedData`] if `types` is not an object of
    /// field arrays, or [`Error::UndefinedType`] if `primary_type` is not
    /// among them.
    pub fn new(
        domain: Eip712Domain,
        types: &Value,
        primary_type: &str,
        message: Value,
    ) -> Result<Self> {
        let object = types
            .as_object()
            .ok_or_else(|| Error::InvalidTypedData("types must be an object".to_string()))?;

        let mut parsed = BTreeMap::new();
        for (name, fields) in object {
            if name == DOMAIN_TYPE {
                continue;
            }
            let fields: Vec<TypeField> = serde_json::from_value(fields.clone())
                .map_err(|e| Error::InvalidTypedData(format!("type {name}: {e}")))?;
            parsed.insert(name.clone(), fields);
        }

        if !parsed.contains_key(primary_type) {
            return Err(Error::UndefinedType(primary_type.to_string()));
        }

        Ok(Self {
            domain,
            types: parsed,
            primary_type: primary_type.to_string(),
            message,
        })
    }

    /// Computes the signing hash for this typed data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTypedData`] if the message does not match the
    /// type definitions, or [`Error::UndefinedType`] for dangling type
    /// references.
    pub fn signing_hash(&self) -> Result<B256> {
        let struct_hash = self.hash_struct(&self.primary_type, &self.message)?;

        let mut data = [0u8; 66];
        data[0] = 0x19;
        data[1] = 0x01;
        data[2..34].copy_from_slice(self.domain.separator_hash().as_slice());
        data[34..].copy_from_slice(struct_hash.as_slice());

        Ok(keccak256(data))
    }

    /// Returns the `encodeType` string of `type_name`, with referenced
    /// struct types appended in alphabetical order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedType`] if the type or one of its
    /// dependencies is missing.
    pub fn encode_type(&self, type_name: &str) -> Result<String> {
        let mut dependencies = Vec::new();
        self.collect_dependencies(type_name, &mut dependencies)?;
        dependencies.retain(|dep| dep != type_name);
        dependencies.sort();

        let mut encoded = String::new();
        for name in std::iter::once(type_name.to_string()).chain(dependencies) {
            let fields = self.fields_of(&name)?;
            encoded.push_str(&format!("{name}({})", join_fields(fields)));
        }
        Ok(encoded)
    }

    /// Renders the document `eth_signTypedData_v4` expects, with the
    /// `EIP712Domain` type included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if the domain can't be serialized.
    pub fn to_rpc_value(&self) -> Result<Value> {
        let mut types = Map::new();
        types.insert(
            DOMAIN_TYPE.to_string(),
            serde_json::to_value(self.domain.fields())?,
        );
        for (name, fields) in &self.types {
            types.insert(name.clone(), serde_json::to_value(fields)?);
        }

        Ok(json!({
            "types": types,
            "domain": serde_json::to_value(&self.domain)?,
            "primaryType": self.primary_type,
            "message": self.message,
        }))
    }

    fn fields_of(&self, type_name: &str) -> Result<&[TypeField]> {
        self.types
            .get(type_name)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::UndefinedType(type_name.to_string()))
    }

    fn collect_dependencies(&self, type_name: &str, found: &mut Vec<String>) -> Result<()> {
        if found.iter().any(|seen| seen == type_name) {
            return Ok(());
        }
        found.push(type_name.to_string());

        for field in self.fields_of(type_name)? {
            let base = base_type(&field.field_type);
            if self.types.contains_key(base) {
                self.collect_dependencies(base, found)?;
            }
        }
        Ok(())
    }

    /// `hashStruct(s) = keccak256(typeHash || encodeData(s))`
    fn hash_struct(&self, type_name: &str, data: &Value) -> Result<B256> {
        let object = data.as_object().ok_or_else(|| {
            Error::InvalidTypedData(format!("{type_name}: expected an object"))
        })?;

        let mut encoded = keccak256(self.encode_type(type_name)?.as_bytes()).to_vec();
        for field in self.fields_of(type_name)? {
            let value = object.get(&field.name).ok_or_else(|| {
                Error::InvalidTypedData(format!("{type_name}: missing field {}", field.name))
            })?;
            encoded.extend_from_slice(&self.encode_value(&field.field_type, value)?);
        }

        Ok(keccak256(&encoded))
    }

    fn encode_value(&self, field_type: &str, value: &Value) -> Result<[u8; 32]> {
        if let Some(item_type) = field_type.strip_suffix("[]") {
            let items = value
                .as_array()
                .ok_or_else(|| Error::InvalidTypedData(format!("{field_type}: expected array")))?;
            let mut concatenated = Vec::with_capacity(items.len() * 32);
            for item in items {
                concatenated.extend_from_slice(&self.encode_value(item_type, item)?);
            }
            return Ok(keccak256(&concatenated).0);
        }

        if self.types.contains_key(field_type) {
            return Ok(self.hash_struct(field_type, value)?.0);
        }

        encode_atomic(field_type, value)
    }
}

/// Strips any number of array suffixes.
fn base_type(field_type: &str) -> &str {
    let mut base = field_type;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
    }
    base
}

fn join_fields(fields: &[TypeField]) -> String {
    fields
        .iter()
        .map(|f| format!("{} {}", f.field_type, f.name))
        .collect::<Vec<_>>()
        .join(",")
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

/// Encodes an atomic or dynamic value into its 32-byte `encodeData` word.
fn encode_atomic(field_type: &str, value: &Value) -> Result<[u8; 32]> {
    let invalid = |what: &str| Error::InvalidTypedData(format!("{field_type}: expected {what}"));

    match field_type {
        "string" => {
            let s = value.as_str().ok_or_else(|| invalid("string"))?;
            Ok(keccak256(s.as_bytes()).0)
        }
        "bytes" => {
            let s = value.as_str().ok_or_else(|| invalid("hex string"))?;
            Ok(keccak256(decode_hex(s)?).0)
        }
        "bool" => {
            let b = value.as_bool().ok_or_else(|| invalid("bool"))?;
            let mut word = [0u8; 32];
            word[31] = u8::from(b);
            Ok(word)
        }
        "address" => {
            let s = value.as_str().ok_or_else(|| invalid("address string"))?;
            let bytes = decode_hex(s)?;
            let address = Address::from_packed(&bytes)
                .map_err(|e| Error::InvalidTypedData(format!("{field_type}: {e}")))?;
            Ok(address_word(&address))
        }
        t if t.starts_with("bytes") => {
            let size: usize = t[5..]
                .parse()
                .ok()
                .filter(|n| (1..=32).contains(n))
                .ok_or_else(|| Error::InvalidTypedData(format!("unsupported type: {t}")))?;
            let s = value.as_str().ok_or_else(|| invalid("hex string"))?;
            let bytes = decode_hex(s)?;
            if bytes.len() != size {
                return Err(Error::InvalidTypedData(format!(
                    "{t}: expected {size} bytes, got {}",
                    bytes.len()
                )));
            }
            let mut word = [0u8; 32];
            word[..size].copy_from_slice(&bytes);
            Ok(word)
        }
        t if t.starts_with("uint") => Ok(parse_uint(value)?.to_be_bytes::<32>()),
        _ => Err(Error::InvalidTypedData(format!(
            "unsupported type: {field_type}"
        ))),
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(s.strip_prefix("0x").unwrap_or(s))?)
}

/// Parses a uint from a JSON number, a decimal string or a `0x` hex string.
fn parse_uint(value: &Value) -> Result<U256> {
    if let Some(n) = value.as_u64() {
        return Ok(U256::from(n));
    }
    let s = value
        .as_str()
        .ok_or_else(|| Error::InvalidTypedData("expected uint".to_string()))?;
    let parsed = match s.strip_prefix("0x") {
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16),
        None => U256::from_str_radix(s, 10),
    };
    parsed.map_err(|_| Error::InvalidTypedData(format!("invalid uint: {s}")))
}
