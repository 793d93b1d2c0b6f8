//! Session activation.
//!
//! The operator submits `checkSig(approval, chainId, v, r, s)` to the factory
//! in a type-4 transaction whose authorization list carries the session's
//! delegation. The operator pays for gas, so its balance is checked first.

use alloy_primitives::U256;
use tracing::{info, warn};

use crate::abi;
use crate::address::Address;
use crate::approval::Approval;
use crate::authorization::SignedAuthorization;
use crate::balance::Balance;
use crate::chain::{ChainReader, ChainWriter, Receipt, TxRequest, send_and_confirm};
use crate::error::{Error, Result};
use crate::signature::Signature;

/// Everything the activation call needs.
#[derive(Debug, Clone)]
pub struct Activation<'a> {
    /// The factory.
    pub factory: Address,
    /// The connected chain.
    pub chain_id: u64,
    /// The operator account that sends and pays.
    pub operator: Address,
    /// The signed approval.
    pub approval: &'a Approval,
    /// Its signature.
    pub signature: &'a Signature,
    /// The session's delegation.
    pub authorization: SignedAuthorization,
    /// Minimum operator balance in wei.
    pub min_balance: U256,
}

impl Activation<'_> {
    /// Returns the transaction to submit.
    #[must_use]
    pub fn request(&self) -> TxRequest {
        TxRequest::call(
            self.operator,
            self.factory,
            abi::check_sig_call(&self.approval.to_abi(), self.chain_id, self.signature),
        )
        .with_authorizations(vec![self.authorization])
    }
}

/// Checks the operator's balance, then submits and confirms activation
/// through `operator_writer`.
///
/// An unreadable balance is logged and does not block submission.
///
/// # Errors
///
/// Returns [`Error::InsufficientBalance`] if the operator holds less than
/// `min_balance`, or any submission error.
pub async fn activate(
    reader: &dyn ChainReader,
    operator_writer: &dyn ChainWriter,
    activation: Activation<'_>,
) -> Result<Receipt> {
    match Balance::refresh(reader, activation.operator).await {
        Balance::Known(have) if have < activation.min_balance => {
            return Err(Error::InsufficientBalance {
                have,
                need: activation.min_balance,
            });
        }
        Balance::Known(_) => {}
        Balance::Unknown => {
            warn!(operator = %activation.operator, "operator balance unknown, submitting anyway");
        }
    }

    let receipt = send_and_confirm(operator_writer, activation.request()).await?;
    info!(hash = %receipt.transaction_hash, "session activated");
    Ok(receipt)
}
