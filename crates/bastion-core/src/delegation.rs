//! Turning the approval signature into the session's EIP-7702 delegation.

use tracing::debug;

use crate::address::Address;
use crate::authorization::{Authorization, SignedAuthorization};
use crate::chain::{self, ChainReader};
use crate::error::{Error, Result};
use crate::signature::Signature;

/// Builds the nonce-0 authorization to the factory's implementation, signed
/// with the approval's `(v, r, s)`, and checks that it recovers to `session`.
///
/// # Errors
///
/// Returns [`Error::AuthorizationMismatch`] if the authority is not
/// `session` or cannot be recovered, plus any error reading `impl()`.
pub async fn authorize_delegation(
    reader: &dyn ChainReader,
    factory: Address,
    chain_id: u64,
    signature: &Signature,
    session: Address,
) -> Result<SignedAuthorization> {
    let implementation = chain::implementation(reader, factory).await?;
    debug!(%implementation, "read delegation target");

    let mismatch = |recovered| Error::AuthorizationMismatch {
        expected: session,
        recovered,
    };

    let signed = Authorization::first(chain_id, implementation)
        .into_signed(signature)
        .map_err(|_| mismatch(None))?;
    let authority = signed.authority().map_err(|_| mismatch(None))?;
    if authority != session {
        return Err(mismatch(Some(authority)));
    }

    Ok(signed)
}
