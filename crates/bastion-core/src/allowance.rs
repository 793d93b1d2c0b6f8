//! ERC-20 allowance settlement for the factory.
//!
//! Some tokens reject changing a non-zero allowance to another non-zero
//! value. When the direct `approve(amount)` fails, the settler resets the
//! allowance to zero and approves again, once.

use alloy_primitives::U256;
use tracing::{debug, info, warn};

use crate::abi;
use crate::address::Address;
use crate::chain::{self, ChainReader, ChainWriter, TxRequest, send_and_confirm};
use crate::error::{Error, Result};

/// How the allowance ended up sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceOutcome {
    /// The existing allowance already covered the amount.
    AlreadySufficient,
    /// A single `approve(amount)` succeeded.
    Approved,
    /// `approve(amount)` failed; `approve(0)` then `approve(amount)` succeeded.
    ResetThenApproved,
}

/// The allowance to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceRequest {
    /// The ERC-20 token.
    pub token: Address,
    /// The token holder, who sends the approvals.
    pub owner: Address,
    /// The spender, i.e. the factory.
    pub spender: Address,
    /// Required allowance in base units.
    pub amount: U256,
}

impl AllowanceRequest {
    fn approve(&self, amount: U256) -> TxRequest {
        TxRequest::call(self.owner, self.token, abi::approve_call(&self.spender, amount))
    }
}

/// Makes sure `spender` may move at least `amount` of `owner`'s tokens.
///
/// # Errors
///
/// Returns [`Error::AllowanceUpdateFailed`] if either fallback step fails,
/// or the read error if the current allowance cannot be determined.
pub async fn settle_allowance(
    reader: &dyn ChainReader,
    writer: &dyn ChainWriter,
    request: AllowanceRequest,
) -> Result<AllowanceOutcome> {
    let current = chain::allowance(reader, request.token, request.owner, request.spender).await?;
    if current >= request.amount {
        debug!(%current, amount = %request.amount, "allowance already sufficient");
        return Ok(AllowanceOutcome::AlreadySufficient);
    }

    match send_and_confirm(writer, request.approve(request.amount)).await {
        Ok(_) => {
            info!(amount = %request.amount, token = %request.token, "allowance approved");
            return Ok(AllowanceOutcome::Approved);
        }
        Err(err) => warn!(error = %err, "approve failed, resetting allowance to zero"),
    }

    send_and_confirm(writer, request.approve(U256::ZERO))
        .await
        .map_err(|e| Error::AllowanceUpdateFailed(format!("reset to zero: {e}")))?;
    send_and_confirm(writer, request.approve(request.amount))
        .await
        .map_err(|e| Error::AllowanceUpdateFailed(format!("approve after reset: {e}")))?;

    info!(amount = %request.amount, token = %request.token, "allowance approved after reset");
    Ok(AllowanceOutcome::ResetThenApproved)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use alloy_primitives::{B256, Bytes};
    use async_trait::async_trait;

    use super::*;
    use crate::chain::{Receipt, TxHash};

    struct AllowanceReader(U256);

    #[async_trait]
    impl ChainReader for AllowanceReader {
        async fn read_contract(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
            Ok(Bytes::copy_from_slice(&self.0.to_be_bytes::<32>()))
        }

        async fn balance(&self, _account: Address) -> Result<U256> {
            Ok(U256::ZERO)
        }
    }

    /// Accepts or reverts each send in turn; reverts once the script runs out.
    struct ScriptedApprovals {
        accept: Mutex<VecDeque<bool>>,
        sent: Mutex<Vec<TxRequest>>,
    }

    impl ScriptedApprovals {
        fn new(accept: &[bool]) -> Self {
            Self {
                accept: Mutex::new(accept.iter().copied().collect()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent_data(&self) -> Vec<Bytes> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|tx| tx.data.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ChainWriter for ScriptedApprovals {
        async fn simulate_then_send(&self, request: TxRequest) -> Result<TxHash> {
            self.sent.lock().unwrap().push(request);
            match self.accept.lock().unwrap().pop_front() {
                Some(true) => Ok(TxHash(B256::repeat_byte(0x01))),
                _ => Err(Error::Reverted("nope".to_string())),
            }
        }

        async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt> {
            Ok(Receipt {
                transaction_hash: hash,
                success: true,
                block_number: Some(1),
            })
        }
    }

    const TOKEN: Address = Address::new([0x70; 20]);
    const OWNER: Address = Address::new([0x0a; 20]);
    const FACTORY: Address = Address::new([0xfa; 20]);

    fn request(amount: u64) -> AllowanceRequest {
        AllowanceRequest {
            token: TOKEN,
            owner: OWNER,
            spender: FACTORY,
            amount: U256::from(amount),
        }
    }

    fn approve(amount: u64) -> Bytes {
        abi::approve_call(&FACTORY, U256::from(amount))
    }

    #[tokio::test]
    async fn covered_allowance_sends_nothing() {
        let writer = ScriptedApprovals::new(&[]);

        let outcome = settle_allowance(&AllowanceReader(U256::from(50u8)), &writer, request(50))
            .await
            .unwrap();

        assert_eq!(outcome, AllowanceOutcome::AlreadySufficient);
        assert!(writer.sent_data().is_empty());
    }

    #[tokio::test]
    async fn single_approve_from_zero() {
        let writer = ScriptedApprovals::new(&[true]);

        let outcome = settle_allowance(&AllowanceReader(U256::ZERO), &writer, request(50))
            .await
            .unwrap();

        assert_eq!(outcome, AllowanceOutcome::Approved);
        assert_eq!(writer.sent_data(), vec![approve(50)]);
        assert_eq!(writer.sent.lock().unwrap()[0].from, OWNER);
    }

    #[tokio::test]
    async fn failed_reset_stops_after_two_sends() {
        let writer = ScriptedApprovals::new(&[]);

        let err = settle_allowance(&AllowanceReader(U256::from(1u8)), &writer, request(50))
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            Error::AllowanceUpdateFailed(reason) if reason.starts_with("reset to zero:")
        ));
        assert_eq!(writer.sent_data(), vec![approve(50), approve(0)]);
    }

    #[tokio::test]
    async fn failed_approve_after_reset_stops_after_three_sends() {
        let writer = ScriptedApprovals::new(&[false, true, false]);

        let err = settle_allowance(&AllowanceReader(U256::from(1u8)), &writer, request(50))
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            Error::AllowanceUpdateFailed(reason) if reason.starts_with("approve after reset:")
        ));
        assert_eq!(writer.sent_data(), vec![approve(50), approve(0), approve(50)]);
    }

    #[tokio::test]
    async fn reset_then_approve_succeeds() {
        let writer = ScriptedApprovals::new(&[false, true, true]);

        let outcome = settle_allowance(&AllowanceReader(U256::from(1u8)), &writer, request(50))
            .await
            .unwrap();

        assert_eq!(outcome, AllowanceOutcome::ResetThenApproved);
        assert_eq!(writer.sent_data().len(), 3);
    }
}
