//! Session address derivation with salt retries.
//!
//! The factory derives the session address from `(chainId, v, r, s)`. A zero
//! result means that signature cannot seed a session, so the resolver moves
//! to the next salt, re-signs and tries again, up to a bounded number of
//! attempts.

use core::result::Result as CoreResult;

use tracing::{debug, info, warn};

use crate::address::Address;
use crate::approval::{Approval, ApprovalBuilder, ApprovalDomain, Salt};
use crate::chain::{self, ChainReader};
use crate::error::{Error, PhaseExt, RunError};
use crate::signature::Signature;
use crate::status::{Phase, StatusSink};
use crate::verify::decompose_and_verify;
use crate::wallet::WalletSigner;

/// The outcome of a successful derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    /// The approval signed on the successful attempt.
    pub approval: Approval,
    /// Its verified signature.
    pub signature: Signature,
    /// The session account address.
    pub session: Address,
    /// 1-based number of the successful attempt.
    pub attempts: usize,
}

/// Inputs shared by every attempt.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// Validated approval inputs.
    pub builder: &'a ApprovalBuilder,
    /// EIP-712 domain for the connected chain.
    pub domain: &'a ApprovalDomain,
    /// The connected owner.
    pub owner: Address,
    /// Salt of the first attempt.
    pub first_salt: Salt,
    /// Attempt budget.
    pub max_attempts: usize,
}

/// Runs build, sign, verify and derive until the factory returns a non-zero
/// address or the attempt budget runs out.
///
/// # Errors
///
/// Fails on the first signing, verification or read error, tagged with the
/// phase it occurred in. Exhausting the budget yields
/// [`Error::DerivationExhausted`] in [`Phase::AddressDerived`].
pub async fn resolve_session(
    reader: &dyn ChainReader,
    wallet: &dyn WalletSigner,
    status: &dyn StatusSink,
    request: ResolveRequest<'_>,
) -> CoreResult<Derivation, RunError> {
    let ResolveRequest {
        builder,
        domain,
        owner,
        first_salt,
        max_attempts,
    } = request;

    let mut salt = first_salt;
    for attempt in 1..=max_attempts {
        let approval = builder.build(salt);
        let typed_data = approval
            .typed_data(domain)
            .in_phase(Phase::SignatureRequested)?;

        debug!(attempt, salt = %salt.as_b256(), "requesting approval signature");
        status.phase_complete(Phase::SignatureRequested, &format!("attempt {attempt}"));
        let raw = wallet
            .sign_typed_data(&typed_data)
            .await
            .in_phase(Phase::SignatureRequested)?;

        let signature = decompose_and_verify(reader, domain, &approval, &raw, owner)
            .await
            .in_phase(Phase::DigestVerified)?;
        status.phase_complete(Phase::DigestVerified, &owner.to_string());

        let session = chain::get_bastion_address(
            reader,
            domain.verifying_contract,
            domain.chain_id,
            &signature,
        )
        .await
        .in_phase(Phase::AddressDerived)?;

        if !session.is_zero() {
            info!(%session, attempt, "session address derived");
            status.phase_complete(Phase::AddressDerived, &session.to_string());
            return Ok(Derivation {
                approval,
                signature,
                session,
                attempts: attempt,
            });
        }

        warn!(attempt, "factory derived the zero address, rotating salt");
        salt = salt.next();
    }

    Err(RunError::new(
        Phase::AddressDerived,
        Error::DerivationExhausted {
            attempts: max_attempts,
        },
    ))
}
