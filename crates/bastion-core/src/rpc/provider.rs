//! Chain access over JSON-RPC.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Bytes, U256};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::time::{Instant, sleep};
use tracing::debug;

use super::{RpcTransport, data, parse_data, parse_hash, parse_u64, parse_u256, quantity_u256};
use crate::address::Address;
use crate::chain::{ChainReader, Receipt, TxHash, TxRequest};
use crate::config::ProtocolConfig;
use crate::error::{Error, Result};

/// Renders `request` as a JSON-RPC transaction object.
pub(crate) fn tx_object(request: &TxRequest) -> Value {
    let mut object = Map::new();
    object.insert("from".to_string(), json!(request.from.to_hex()));
    object.insert("to".to_string(), json!(request.to.to_hex()));
    object.insert("data".to_string(), json!(data(&request.data)));
    object.insert("value".to_string(), json!(quantity_u256(request.value)));
    if !request.authorization_list.is_empty() {
        let list: Vec<Value> = request
            .authorization_list
            .iter()
            .map(|auth| auth.to_rpc_value())
            .collect();
        object.insert("authorizationList".to_string(), Value::Array(list));
    }
    Value::Object(object)
}

/// A node reached through an [`RpcTransport`].
#[derive(Clone)]
pub struct RpcProvider {
    transport: Arc<dyn RpcTransport>,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcProvider {
    /// Creates a provider polling receipts as `config` specifies.
    #[must_use]
    pub fn new(transport: Arc<dyn RpcTransport>, config: &ProtocolConfig) -> Self {
        Self {
            transport,
            poll_interval: config.receipt_poll_interval(),
            receipt_timeout: config.receipt_timeout(),
        }
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.transport
    }

    /// `eth_chainId`
    ///
    /// # Errors
    ///
    /// Returns RPC or parse errors.
    pub async fn chain_id(&self) -> Result<u64> {
        let value = self.transport.request("eth_chainId", json!([])).await?;
        parse_u64(&value, "eth_chainId")
    }

    /// Runs `request` through `eth_call` without submitting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reverted`] if the call reverts.
    pub async fn simulate(&self, request: &TxRequest) -> Result<Bytes> {
        let value = self
            .transport
            .request("eth_call", json!([tx_object(request), "latest"]))
            .await?;
        parse_data(&value, "eth_call")
    }

    /// `eth_estimateGas`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reverted`] if execution would revert.
    pub async fn estimate_gas(&self, request: &TxRequest) -> Result<u64> {
        let value = self
            .transport
            .request("eth_estimateGas", json!([tx_object(request)]))
            .await?;
        parse_u64(&value, "eth_estimateGas")
    }

    /// `eth_getTransactionCount` at the pending block.
    ///
    /// # Errors
    ///
    /// Returns RPC or parse errors.
    pub async fn nonce(&self, account: Address) -> Result<u64> {
        let value = self
            .transport
            .request(
                "eth_getTransactionCount",
                json!([account.to_hex(), "pending"]),
            )
            .await?;
        parse_u64(&value, "eth_getTransactionCount")
    }

    /// `eth_gasPrice`
    ///
    /// # Errors
    ///
    /// Returns RPC or parse errors.
    pub async fn gas_price(&self) -> Result<U256> {
        let value = self.transport.request("eth_gasPrice", json!([])).await?;
        parse_u256(&value, "eth_gasPrice")
    }

    /// `eth_maxPriorityFeePerGas`
    ///
    /// # Errors
    ///
    /// Returns RPC or parse errors.
    pub async fn max_priority_fee(&self) -> Result<U256> {
        let value = self
            .transport
            .request("eth_maxPriorityFeePerGas", json!([]))
            .await?;
        parse_u256(&value, "eth_maxPriorityFeePerGas")
    }

    /// `eth_sendRawTransaction`
    ///
    /// # Errors
    ///
    /// Returns RPC or parse errors.
    pub async fn send_raw(&self, raw: &[u8]) -> Result<TxHash> {
        let value = self
            .transport
            .request("eth_sendRawTransaction", json!([data(raw)]))
            .await?;
        Ok(TxHash(parse_hash(&value, "eth_sendRawTransaction")?))
    }

    /// `eth_getTransactionReceipt`. `None` while the transaction is pending.
    ///
    /// # Errors
    ///
    /// Returns RPC or parse errors.
    pub async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let value = self
            .transport
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }

        let block_number = match value.get("blockNumber") {
            None | Some(Value::Null) => None,
            Some(block) => Some(parse_u64(block, "blockNumber")?),
        };
        let status = value
            .get("status")
            .ok_or_else(|| Error::JsonError("receipt without status".to_string()))?;

        Ok(Some(Receipt {
            transaction_hash: hash,
            success: parse_u64(status, "status")? == 1,
            block_number,
        }))
    }

    /// Polls for the receipt of `hash` until it is mined or the timeout
    /// elapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransactionFailed`] on timeout.
    pub async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            if let Some(receipt) = self.receipt(hash).await? {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(Error::TransactionFailed(format!(
                    "{hash} not mined within {}s",
                    self.receipt_timeout.as_secs()
                )));
            }
            debug!(%hash, "receipt pending");
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ChainReader for RpcProvider {
    async fn read_contract(&self, to: Address, calldata: Bytes) -> Result<Bytes> {
        let value = self
            .transport
            .request(
                "eth_call",
                json!([{"to": to.to_hex(), "data": data(&calldata)}, "latest"]),
            )
            .await?;
        parse_data(&value, "eth_call")
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        let value = self
            .transport
            .request("eth_getBalance", json!([account.to_hex(), "latest"]))
            .await?;
        parse_u256(&value, "eth_getBalance")
    }
}
