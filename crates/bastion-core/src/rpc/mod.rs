//! JSON-RPC plumbing.
//!
//! Everything that talks to a node or a wallet provider goes through an
//! [`RpcTransport`]. The transport only moves requests; the types built on
//! it give the calls meaning:
//!
//! - [`RpcProvider`]: chain reads, receipts, fees and raw submission
//! - [`Eip1193Wallet`]: a provider wallet that signs and sends for the owner
//! - [`LocalSender`]: signs transactions with an in-process key and submits
//!   them raw
//! - [`OwnerWallet`]: the owner backend selected by [`crate::config::WalletConfig`]
//!
//! # Transport Abstraction
//!
//! [`HttpTransport`] (feature `http`) posts JSON-RPC 2.0 over HTTP. Tests
//! implement [`RpcTransport`] over scripted responses.

pub mod backend;
pub mod local;
pub mod provider;
pub mod wallet;

#[cfg(feature = "http")]
pub mod http;

pub use backend::OwnerWallet;
pub use local::LocalSender;
pub use provider::RpcProvider;
pub use wallet::Eip1193Wallet;

#[cfg(feature = "http")]
pub use http::HttpTransport;

use alloy_primitives::{B256, Bytes, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// JSON-RPC error code nodes use for reverted calls.
pub const REVERT_CODE: i64 = 3;

/// A JSON-RPC request channel.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Sends `method` with positional `params` and returns the `result`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reverted`] for revert errors, [`Error::Rpc`] for other
    /// error objects, or [`Error::Transport`] if the request never completes.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Revert data, if any.
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Returns `true` for reverted calls.
    #[must_use]
    pub fn is_revert(&self) -> bool {
        self.code == REVERT_CODE || self.message.contains("execution reverted")
    }
}

impl From<RpcErrorObject> for Error {
    fn from(err: RpcErrorObject) -> Self {
        if err.is_revert() {
            let detail = match err.data {
                Some(Value::String(data)) => format!("{} ({data})", err.message),
                _ => err.message,
            };
            Error::Reverted(detail)
        } else {
            Error::Rpc {
                code: err.code,
                message: err.message,
            }
        }
    }
}

/// Formats a `U256` as a JSON-RPC quantity.
pub(crate) fn quantity_u256(value: U256) -> String {
    format!("{value:#x}")
}

/// Formats bytes as `0x`-prefixed hex data.
pub(crate) fn data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn expect_str<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| Error::JsonError(format!("{what}: expected a string, got {value}")))
}

/// Parses a JSON-RPC quantity into a `u64`.
pub(crate) fn parse_u64(value: &Value, what: &str) -> Result<u64> {
    let text = expect_str(value, what)?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(digits, 16)
        .map_err(|e| Error::JsonError(format!("{what}: bad quantity {text}: {e}")))
}

/// Parses a JSON-RPC quantity into a `U256`.
pub(crate) fn parse_u256(value: &Value, what: &str) -> Result<U256> {
    let text = expect_str(value, what)?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    U256::from_str_radix(digits, 16)
        .map_err(|e| Error::JsonError(format!("{what}: bad quantity {text}: {e}")))
}

/// Parses `0x`-prefixed hex data.
pub(crate) fn parse_data(value: &Value, what: &str) -> Result<Bytes> {
    let text = expect_str(value, what)?;
    Ok(hex::decode(text.strip_prefix("0x").unwrap_or(text))?.into())
}

/// Parses a 32-byte hash.
pub(crate) fn parse_hash(value: &Value, what: &str) -> Result<B256> {
    let bytes = parse_data(value, what)?;
    if bytes.len() != 32 {
        return Err(Error::JsonError(format!(
            "{what}: expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(B256::from_slice(&bytes))
}

#[cfg(test)]
pub(crate) mod testing {
    //! A scripted transport shared by the rpc tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies to each method from a per-method queue and records every call.
    #[derive(Default)]
    pub struct ScriptedTransport {
        replies: Mutex<Vec<(String, VecDeque<Result<Value>>)>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, method: &str, result: Result<Value>) -> Self {
            {
                let mut replies = self.replies.lock().unwrap();
                match replies.iter_mut().find(|(m, _)| m == method) {
                    Some((_, queue)) => queue.push_back(result),
                    None => replies.push((method.to_string(), VecDeque::from([result]))),
                }
            }
            self
        }

        pub fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }

        pub fn methods(&self) -> Vec<String> {
            self.calls().into_iter().map(|(m, _)| m).collect()
        }
    }

    #[async_trait]
    impl RpcTransport for ScriptedTransport {
        async fn request(&self, method: &str, params: Value) -> Result<Value> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            let mut replies = self.replies.lock().unwrap();
            let queue = replies
                .iter_mut()
                .find(|(m, _)| m == method)
                .map(|(_, queue)| queue);
            match queue.and_then(VecDeque::pop_front) {
                Some(result) => result,
                None => Err(Error::Transport(format!("no scripted reply for {method}"))),
            }
        }
    }
}
