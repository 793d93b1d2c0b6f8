//! Operator key rotation on an existing session account.

use tracing::info;

use crate::abi;
use crate::address::Address;
use crate::chain::{self, ChainReader, ChainWriter, TxRequest, send_and_confirm};
use crate::error::{Error, Result};

/// Sends `changeOperator(new_operator)` from `owner` and confirms the
/// session account reports the new operator afterwards.
///
/// # Errors
///
/// - [`Error::Unauthorized`] if the call reverts, typically because `owner`
///   does not control `session`
/// - [`Error::TransactionFailed`] if `operator()` does not return
///   `new_operator` after confirmation
pub async fn rotate_operator(
    reader: &dyn ChainReader,
    writer: &dyn ChainWriter,
    owner: Address,
    session: Address,
    new_operator: Address,
) -> Result<()> {
    let request = TxRequest::call(owner, session, abi::change_operator_call(&new_operator));
    let receipt = send_and_confirm(writer, request).await.map_err(|e| {
        if e.is_revert() {
            Error::Unauthorized(format!("{owner} cannot change the operator of {session}: {e}"))
        } else {
            e
        }
    })?;

    let current = chain::operator(reader, session).await?;
    if current != new_operator {
        return Err(Error::TransactionFailed(format!(
            "operator is {current} after {}, expected {new_operator}",
            receipt.transaction_hash
        )));
    }

    info!(%session, operator = %new_operator, "operator rotated");
    Ok(())
}
