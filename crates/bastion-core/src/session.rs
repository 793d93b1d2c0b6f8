//! Protocol entry points.
//!
//! [`SessionProtocol`] strings the components together:
//!
//! ```text
//! create_session:  key → approval → sign → verify → derive (retry on zero)
//!                  → authorize delegation → settle allowance
//! activate:        balance check → checkSig with the delegation (type 4)
//! rotate_operator: key → changeOperator → read back operator()
//! ```
//!
//! Every entry point reports completed phases to a [`StatusSink`] and fails
//! with a [`RunError`] naming the phase that failed. Nothing is persisted.

use core::result::Result as CoreResult;

use tracing::info;

use crate::activation::{self, Activation};
use crate::address::Address;
use crate::allowance::{AllowanceOutcome, AllowanceRequest, settle_allowance};
use crate::approval::{Approval, ApprovalBuilder, ApprovalDomain, Salt};
use crate::authorization::SignedAuthorization;
use crate::chain::{ChainReader, ChainWriter, Receipt};
use crate::config::ProtocolConfig;
use crate::crypto::Keypair;
use crate::delegation::authorize_delegation;
use crate::error::{PhaseExt, Result, RunError};
use crate::resolver::{ResolveRequest, resolve_session};
use crate::rotation;
use crate::signature::Signature;
use crate::status::{Phase, StatusSink};
use crate::wallet::{WalletSigner, owner_account};

/// User inputs for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// ERC-20 token address, as typed by the user.
    pub token: String,
    /// Decimal spending limit, as typed by the user.
    pub amount: String,
    /// Salt of the first attempt. `None` draws a random one.
    pub salt: Option<Salt>,
}

impl SessionRequest {
    /// Creates a request with a random first salt.
    #[must_use]
    pub fn new(token: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            amount: amount.into(),
            salt: None,
        }
    }
}

/// A created, not yet activated, session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// The session's operator key. Shown to the user once.
    pub operator: Keypair,
    /// The owner that signed the approval.
    pub owner: Address,
    /// The chain the session lives on.
    pub chain_id: u64,
    /// The session account.
    pub session: Address,
    /// The approval signed on the successful attempt.
    pub approval: Approval,
    /// Its signature.
    pub signature: Signature,
    /// The session's delegation.
    pub authorization: SignedAuthorization,
    /// Number of derivation attempts used.
    pub attempts: usize,
    /// How the factory's allowance was settled.
    pub allowance: AllowanceOutcome,
}

/// Runs the session protocol against one factory.
pub struct SessionProtocol<'a> {
    config: &'a ProtocolConfig,
    reader: &'a dyn ChainReader,
    status: &'a dyn StatusSink,
}

impl<'a> SessionProtocol<'a> {
    /// Binds the protocol to a configuration, a chain and a status sink.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if `config` fails validation.
    pub fn new(
        config: &'a ProtocolConfig,
        reader: &'a dyn ChainReader,
        status: &'a dyn StatusSink,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reader,
            status,
        })
    }

    /// Creates a session for the owner behind `wallet`. Owner transactions
    /// go through `owner_writer`.
    ///
    /// # Errors
    ///
    /// Returns the first failure, tagged with its phase.
    pub async fn create_session(
        &self,
        wallet: &dyn WalletSigner,
        owner_writer: &dyn ChainWriter,
        request: SessionRequest,
    ) -> CoreResult<SessionOutcome, RunError> {
        let operator = Keypair::generate();
        self.status
            .phase_complete(Phase::KeyGenerated, &operator.address().to_string());

        let builder = ApprovalBuilder::new(
            operator.address(),
            &request.token,
            &request.amount,
            &self.config.allowed_origin,
        )
        .in_phase(Phase::SignatureRequested)?;
        let chain_id = wallet.chain_id().await.in_phase(Phase::SignatureRequested)?;
        let owner = owner_account(wallet)
            .await
            .in_phase(Phase::SignatureRequested)?;
        let domain = ApprovalDomain::new(self.config, chain_id);
        info!(%owner, chain_id, amount = %builder.amount(), "creating session");

        let derivation = resolve_session(
            self.reader,
            wallet,
            self.status,
            ResolveRequest {
                builder: &builder,
                domain: &domain,
                owner,
                first_salt: request.salt.unwrap_or_else(Salt::random),
                max_attempts: self.config.max_derivation_attempts,
            },
        )
        .await?;

        let authorization = authorize_delegation(
            self.reader,
            self.config.factory,
            chain_id,
            &derivation.signature,
            derivation.session,
        )
        .await
        .in_phase(Phase::DelegationAuthorized)?;
        self.status.phase_complete(
            Phase::DelegationAuthorized,
            &authorization.inner.address.to_string(),
        );

        let allowance = settle_allowance(
            self.reader,
            owner_writer,
            AllowanceRequest {
                token: builder.token(),
                owner,
                spender: self.config.factory,
                amount: builder.amount(),
            },
        )
        .await
        .in_phase(Phase::AllowanceSettled)?;
        self.status
            .phase_complete(Phase::AllowanceSettled, &format!("{allowance:?}"));

        Ok(SessionOutcome {
            operator,
            owner,
            chain_id,
            session: derivation.session,
            approval: derivation.approval,
            signature: derivation.signature,
            authorization,
            attempts: derivation.attempts,
            allowance,
        })
    }

    /// Sends the activation for `session` from its operator through
    /// `operator_writer`.
    ///
    /// # Errors
    ///
    /// Fails in [`Phase::ActivationComplete`].
    pub async fn activate(
        &self,
        session: &SessionOutcome,
        operator_writer: &dyn ChainWriter,
    ) -> CoreResult<Receipt, RunError> {
        let receipt = activation::activate(
            self.reader,
            operator_writer,
            Activation {
                factory: self.config.factory,
                chain_id: session.chain_id,
                operator: session.operator.address(),
                approval: &session.approval,
                signature: &session.signature,
                authorization: session.authorization,
                min_balance: self.config.min_activation_balance,
            },
        )
        .await
        .in_phase(Phase::ActivationComplete)?;
        self.status.phase_complete(
            Phase::ActivationComplete,
            &receipt.transaction_hash.to_string(),
        );
        Ok(receipt)
    }

    /// Replaces the operator of `session` with a fresh key and returns it.
    ///
    /// # Errors
    ///
    /// Fails in [`Phase::OperatorRotated`], except for key generation.
    pub async fn rotate_operator(
        &self,
        wallet: &dyn WalletSigner,
        owner_writer: &dyn ChainWriter,
        session: Address,
    ) -> CoreResult<Keypair, RunError> {
        let operator = Keypair::generate();
        self.status
            .phase_complete(Phase::KeyGenerated, &operator.address().to_string());

        let owner = owner_account(wallet).await.in_phase(Phase::OperatorRotated)?;
        rotation::rotate_operator(
            self.reader,
            owner_writer,
            owner,
            session,
            operator.address(),
        )
        .await
        .in_phase(Phase::OperatorRotated)?;
        self.status
            .phase_complete(Phase::OperatorRotated, &operator.address().to_string());

        Ok(operator)
    }
}
