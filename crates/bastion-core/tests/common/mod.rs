//! An in-memory factory, session accounts and ERC-20 for protocol tests.
//!
//! The mock computes approval digests with `alloy-sol-types` rather than the
//! crate's own EIP-712 encoder, and derives session addresses the way the
//! factory does: the authority of the approval signature read as an EIP-7702
//! authorization to the implementation.

#![allow(dead_code)]

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Mutex;

use alloy_primitives::{B256, Bytes, U256};
use alloy_sol_types::{Eip712Domain as SolDomain, SolCall, SolStruct};
use async_trait::async_trait;
use bastion_core::abi::{self, IBastion, IBastionFactory, IERC20};
use bastion_core::authorization::authorization_signer;
use bastion_core::crypto::recover_address;
use bastion_core::{
    Address, ChainReader, ChainWriter, Error, Keypair, LocalWallet, ProtocolConfig, Receipt,
    Result, Signature, TxHash, TxRequest, TypedData, WalletSigner,
};

pub const CHAIN_ID: u64 = 11_155_111;
pub const FACTORY: Address = Address::new([0xfa; 20]);
pub const IMPLEMENTATION: Address = Address::new([0x1e; 20]);
pub const TOKEN: Address = Address::new([0x70; 20]);

pub fn token_str() -> String {
    TOKEN.to_checksum_hex()
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn config() -> ProtocolConfig {
    let mut config = ProtocolConfig::new(FACTORY);
    config.receipt_poll_interval_ms = 1;
    config.receipt_timeout_ms = 100;
    config
}

#[derive(Default)]
struct State {
    allowances: HashMap<(Address, Address), U256>,
    picky_token: bool,
    degenerate_derivations: usize,
    derivations: Vec<(Signature, Address)>,
    approvals: Vec<U256>,
    operators: HashMap<Address, Vec<u8>>,
    owners: HashMap<Address, Address>,
    balances: HashMap<Address, U256>,
    balance_unavailable: bool,
    tamper_digest: bool,
    ignore_operator_change: bool,
    submitted: Vec<TxRequest>,
    receipts: HashMap<TxHash, Receipt>,
    activations: Vec<Address>,
}

/// A single-node chain hosting the factory, the token and session accounts.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<State>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// `getBastionAddress` returns zero for the first `n` calls.
    pub fn degenerate_derivations(self, n: usize) -> Self {
        self.state().degenerate_derivations = n;
        self
    }

    /// The token rejects changing a non-zero allowance to a non-zero value.
    pub fn picky_token(self) -> Self {
        self.state().picky_token = true;
        self
    }

    /// `getDigest` answers with a corrupted digest.
    pub fn tamper_digest(self) -> Self {
        self.state().tamper_digest = true;
        self
    }

    /// `changeOperator` succeeds without storing the new operator.
    pub fn ignore_operator_change(self) -> Self {
        self.state().ignore_operator_change = true;
        self
    }

    /// `eth_getBalance` fails.
    pub fn balance_unavailable(self) -> Self {
        self.state().balance_unavailable = true;
        self
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: U256) {
        self.state().allowances.insert((owner, spender), amount);
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn fund(&self, account: Address, wei: U256) {
        self.state().balances.insert(account, wei);
    }

    pub fn register_session(&self, session: Address, owner: Address, operator: Address) {
        let mut state = self.state();
        state.owners.insert(session, owner);
        state.operators.insert(session, operator.packed());
    }

    pub fn operator_of(&self, session: Address) -> Option<Vec<u8>> {
        self.state().operators.get(&session).cloned()
    }

    /// Every `approve` amount the token accepted, in order.
    pub fn approvals(&self) -> Vec<U256> {
        self.state().approvals.clone()
    }

    /// `(signature, result)` of every `getBastionAddress` call.
    pub fn derivations(&self) -> Vec<(Signature, Address)> {
        self.state().derivations.clone()
    }

    pub fn submitted(&self) -> Vec<TxRequest> {
        self.state().submitted.clone()
    }

    pub fn activations(&self) -> Vec<Address> {
        self.state().activations.clone()
    }

    fn digest(approval: &abi::Approval) -> B256 {
        let domain = SolDomain::new(
            Some(Cow::Borrowed("BastionFactory")),
            Some(Cow::Borrowed("0.0.0-beta")),
            Some(U256::from(CHAIN_ID)),
            Some(FACTORY.inner()),
            None,
        );
        approval.eip712_signing_hash(&domain)
    }

    fn factory_call(&self, data: &[u8]) -> Result<Bytes> {
        let selector = abi::selector(data);
        if selector == Some(IBastionFactory::getDigestCall::SELECTOR) {
            let call = IBastionFactory::getDigestCall::abi_decode(data, true)?;
            let mut digest = Self::digest(&call.approval);
            if self.state().tamper_digest {
                digest.0[0] ^= 0xff;
            }
            return Ok(word(digest.0));
        }
        if selector == Some(IBastionFactory::getBastionAddressCall::SELECTOR) {
            let call = IBastionFactory::getBastionAddressCall::abi_decode(data, true)?;
            let signature = Signature::new(call.r.0, call.s.0, call.v);
            let mut state = self.state();
            let session = if state.derivations.len() < state.degenerate_derivations {
                Address::zero()
            } else {
                let chain_id = u64::try_from(call.chainId)
                    .map_err(|e| Error::AbiDecodeFailed(e.to_string()))?;
                authorization_signer(&signature, chain_id, IMPLEMENTATION)
                    .unwrap_or_else(|_| Address::zero())
            };
            state.derivations.push((signature, session));
            return Ok(address_word(session));
        }
        if data == abi::impl_call().as_ref() {
            return Ok(address_word(IMPLEMENTATION));
        }
        Err(Error::Reverted("unknown factory selector".to_string()))
    }

    fn token_call(&self, data: &[u8]) -> Result<Bytes> {
        if abi::selector(data) == Some(IERC20::allowanceCall::SELECTOR) {
            let call = IERC20::allowanceCall::abi_decode(data, true)?;
            let value = self.allowance(call.owner.into(), call.spender.into());
            return Ok(word(value.to_be_bytes::<32>()));
        }
        Err(Error::Reverted("unknown token selector".to_string()))
    }

    fn session_call(&self, to: Address, data: &[u8]) -> Result<Bytes> {
        let operator = self
            .operator_of(to)
            .ok_or_else(|| Error::Reverted(format!("no code at {to}")))?;
        if abi::selector(data) == Some(IBastion::operatorCall::SELECTOR) {
            return Ok(dynamic_bytes(&operator));
        }
        Err(Error::Reverted("unknown session selector".to_string()))
    }

    fn execute(&self, request: &TxRequest) -> Result<()> {
        let data = request.data.as_ref();
        let selector = abi::selector(data);

        if request.to == TOKEN && selector == Some(IERC20::approveCall::SELECTOR) {
            let call = IERC20::approveCall::abi_decode(data, true)?;
            let spender = Address::from(call.spender);
            let mut state = self.state();
            let current = state
                .allowances
                .get(&(request.from, spender))
                .copied()
                .unwrap_or_default();
            if state.picky_token && !current.is_zero() && !call.amount.is_zero() {
                return Err(Error::Reverted("approve from non-zero allowance".to_string()));
            }
            state.allowances.insert((request.from, spender), call.amount);
            state.approvals.push(call.amount);
            return Ok(());
        }

        if request.to == FACTORY && selector == Some(IBastionFactory::checkSigCall::SELECTOR) {
            let call = IBastionFactory::checkSigCall::abi_decode(data, true)?;
            let authorization = request
                .authorization_list
                .first()
                .ok_or_else(|| Error::Reverted("missing delegation".to_string()))?;
            let session = authorization.authority()?;
            let signature = Signature::new(call.r.0, call.s.0, call.v);
            let owner = recover_address(&Self::digest(&call.approval), &signature)?;

            let mut state = self.state();
            state.owners.insert(session, owner);
            state.operators.insert(session, call.approval.operator.to_vec());
            state.activations.push(session);
            return Ok(());
        }

        if selector == Some(IBastion::changeOperatorCall::SELECTOR) {
            let call = IBastion::changeOperatorCall::abi_decode(data, true)?;
            let mut state = self.state();
            if state.owners.get(&request.to) != Some(&request.from) {
                return Err(Error::Reverted("caller is not the owner".to_string()));
            }
            if !state.ignore_operator_change {
                state.operators.insert(request.to, call.newOperator.to_vec());
            }
            return Ok(());
        }

        Err(Error::Reverted("unsupported transaction".to_string()))
    }
}

fn word(bytes: [u8; 32]) -> Bytes {
    Bytes::copy_from_slice(&bytes)
}

fn address_word(address: Address) -> Bytes {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address.as_bytes());
    word(out)
}

fn dynamic_bytes(data: &[u8]) -> Bytes {
    let mut out = U256::from(32u8).to_be_bytes::<32>().to_vec();
    out.extend_from_slice(&U256::from(data.len()).to_be_bytes::<32>());
    out.extend_from_slice(data);
    out.resize(64 + data.len().div_ceil(32) * 32, 0);
    out.into()
}

#[async_trait]
impl ChainReader for MockChain {
    async fn read_contract(&self, to: Address, data: Bytes) -> Result<Bytes> {
        if to == FACTORY {
            self.factory_call(&data)
        } else if to == TOKEN {
            self.token_call(&data)
        } else {
            self.session_call(to, &data)
        }
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        let state = self.state();
        if state.balance_unavailable {
            return Err(Error::Transport("node unavailable".to_string()));
        }
        Ok(state.balances.get(&account).copied().unwrap_or_default())
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    async fn simulate_then_send(&self, request: TxRequest) -> Result<TxHash> {
        self.state().submitted.push(request.clone());
        self.execute(&request)?;

        let mut state = self.state();
        let nonce = state.receipts.len() as u64 + 1;
        let hash = TxHash(B256::left_padding_from(&nonce.to_be_bytes()));
        state.receipts.insert(
            hash,
            Receipt {
                transaction_hash: hash,
                success: true,
                block_number: Some(nonce),
            },
        );
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, hash: TxHash) -> Result<Receipt> {
        self.state()
            .receipts
            .get(&hash)
            .cloned()
            .ok_or_else(|| Error::TransactionFailed(format!("{hash} unknown")))
    }
}

pub fn owner_wallet(key: &Keypair) -> LocalWallet {
    LocalWallet::new(key.clone(), CHAIN_ID)
}

/// Claims one account but signs with another key.
pub struct ImpostorWallet {
    pub claimed: Address,
    pub signer: LocalWallet,
}

#[async_trait]
impl WalletSigner for ImpostorWallet {
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Vec<u8>> {
        self.signer.sign_typed_data(typed_data).await
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        Ok(vec![self.claimed])
    }
}

/// Signs the requested approval with its amount bumped by one base unit.
pub struct TamperingWallet(pub LocalWallet);

#[async_trait]
impl WalletSigner for TamperingWallet {
    async fn sign_typed_data(&self, typed_data: &TypedData) -> Result<Vec<u8>> {
        let mut tampered = typed_data.clone();
        let amount: U256 = tampered.message["amount"]
            .as_str()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| Error::InvalidTypedData("amount".to_string()))?;
        tampered.message["amount"] = (amount + U256::from(1u8)).to_string().into();
        self.0.sign_typed_data(&tampered).await
    }

    async fn chain_id(&self) -> Result<u64> {
        self.0.chain_id().await
    }

    async fn addresses(&self) -> Result<Vec<Address>> {
        self.0.addresses().await
    }
}
