//! Approval signature decomposition and verification.
//!
//! A wallet signature is accepted only if the digest this client computes
//! matches the factory's `getDigest`, and the signature recovers to the
//! connected owner under that digest.

use alloy_primitives::B256;
use tracing::debug;

use crate::address::Address;
use crate::approval::{Approval, ApprovalDomain};
use crate::chain::{self, ChainReader};
use crate::crypto::recover_address;
use crate::error::{Error, Result};
use crate::signature::Signature;

/// Recovers the account that signed an approval `digest`.
///
/// The counterpart of [`crate::authorization::authorization_signer`] over
/// the same `(v, r, s)`.
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if nothing recovers.
pub fn approval_signer(digest: &B256, signature: &Signature) -> Result<Address> {
    recover_address(digest, signature)
}

/// Splits `raw`, checks the digest against the factory and checks the
/// signer against `owner`.
///
/// Returns the signature with `v` normalized to 27 or 28.
///
/// # Errors
///
/// - [`Error::InvalidSignature`] if `raw` is not 65 bytes or does not recover
/// - [`Error::DigestMismatch`] if `getDigest` disagrees with the local digest
/// - [`Error::SignerMismatch`] if the signer is not `owner`
pub async fn decompose_and_verify(
    reader: &dyn ChainReader,
    domain: &ApprovalDomain,
    approval: &Approval,
    raw: &[u8],
    owner: Address,
) -> Result<Signature> {
    let signature = Signature::from_bytes(raw)?;

    let local = approval.digest(domain)?;
    let chain = chain::get_digest(reader, domain.verifying_contract, approval).await?;
    if local != chain {
        return Err(Error::DigestMismatch { local, chain });
    }
    debug!(digest = %local, "digest agrees with factory");

    let recovered = approval_signer(&local, &signature)?;
    if recovered != owner {
        return Err(Error::SignerMismatch {
            expected: owner,
            recovered,
        });
    }

    Ok(signature)
}
