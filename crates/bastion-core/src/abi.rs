//! Contract ABI: calldata encoders and return-data decoders.
//!
//! The factory, session account and ERC-20 interfaces are declared with
//! `alloy_sol_types::sol!`. The factory's `impl()` getter is encoded by hand
//! since `impl` is a Rust keyword.

use alloy_primitives::{Address as AlloyAddress, B256, Bytes, U256, keccak256};
use alloy_sol_types::{SolCall, sol};

use crate::address::Address;
use crate::error::{Error, Result};
use crate::signature::Signature;

sol! {
    /// The on-chain approval record.
    #[derive(Debug, PartialEq, Eq)]
    struct Approval {
        bytes operator;
        address token;
        uint256 amount;
        bytes32 domain;
        bytes32 salt;
    }

    /// The session factory.
    interface IBastionFactory {
        function getDigest(Approval approval) external view returns (bytes32);
        function getBastionAddress(uint256 chainId, uint8 v, bytes32 r, bytes32 s) external view returns (address);
        function checkSig(Approval approval, uint256 chainId, uint8 v, bytes32 r, bytes32 s) external;
    }

    /// A deployed session account.
    interface IBastion {
        function owner() external view returns (address);
        function operator() external view returns (bytes);
        function changeOperator(bytes newOperator) external;
    }

    /// The ERC-20 subset the client touches.
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }

    /// A demo token with open minting.
    interface IMockToken {
        function mint(address to, uint256 amount) external;
    }
}

/// Signature `impl()`.
const IMPL_SIGNATURE: &str = "impl()";

/// `getDigest(approval)`
#[must_use]
pub fn get_digest_call(approval: &Approval) -> Bytes {
    IBastionFactory::getDigestCall {
        approval: approval.clone(),
    }
    .abi_encode()
    .into()
}

/// Decodes the `bytes32` returned by `getDigest`.
///
/// # Errors
///
/// Returns [`Error::AbiDecodeFailed`] for malformed return data.
pub fn decode_digest(data: &[u8]) -> Result<B256> {
    Ok(IBastionFactory::getDigestCall::abi_decode_returns(data, true)?._0)
}

/// `getBastionAddress(chainId, v, r, s)`
#[must_use]
pub fn get_bastion_address_call(chain_id: u64, signature: &Signature) -> Bytes {
    IBastionFactory::getBastionAddressCall {
        chainId: U256::from(chain_id),
        v: signature.v(),
        r: signature.r_b256(),
        s: signature.s_b256(),
    }
    .abi_encode()
    .into()
}

/// Decodes an `address` return word.
///
/// # Errors
///
/// Returns [`Error::AbiDecodeFailed`] if `data` is not an ABI address word.
pub fn decode_address(data: &[u8]) -> Result<Address> {
    Ok(IBastionFactory::getBastionAddressCall::abi_decode_returns(data, true)?
        ._0
        .into())
}

/// `checkSig(approval, chainId, v, r, s)`
#[must_use]
pub fn check_sig_call(approval: &Approval, chain_id: u64, signature: &Signature) -> Bytes {
    IBastionFactory::checkSigCall {
        approval: approval.clone(),
        chainId: U256::from(chain_id),
        v: signature.v(),
        r: signature.r_b256(),
        s: signature.s_b256(),
    }
    .abi_encode()
    .into()
}

/// `impl()`
#[must_use]
pub fn impl_call() -> Bytes {
    Bytes::copy_from_slice(&keccak256(IMPL_SIGNATURE.as_bytes())[..4])
}

/// `operator()`
#[must_use]
pub fn operator_call() -> Bytes {
    IBastion::operatorCall {}.abi_encode().into()
}

/// Decodes the `bytes` returned by `operator()`.
///
/// # Errors
///
/// Returns [`Error::AbiDecodeFailed`] for malformed return data.
pub fn decode_operator(data: &[u8]) -> Result<Bytes> {
    Ok(IBastion::operatorCall::abi_decode_returns(data, true)?._0)
}

/// `changeOperator(encodePacked(operator))`
#[must_use]
pub fn change_operator_call(operator: &Address) -> Bytes {
    IBastion::changeOperatorCall {
        newOperator: operator.packed().into(),
    }
    .abi_encode()
    .into()
}

/// `approve(spender, amount)`
#[must_use]
pub fn approve_call(spender: &Address, amount: U256) -> Bytes {
    IERC20::approveCall {
        spender: spender.inner(),
        amount,
    }
    .abi_encode()
    .into()
}

/// `allowance(owner, spender)`
#[must_use]
pub fn allowance_call(owner: &Address, spender: &Address) -> Bytes {
    IERC20::allowanceCall {
        owner: owner.inner(),
        spender: spender.inner(),
    }
    .abi_encode()
    .into()
}

/// Decodes a `uint256` return word.
///
/// # Errors
///
/// Returns [`Error::AbiDecodeFailed`] for malformed return data.
pub fn decode_uint(data: &[u8]) -> Result<U256> {
    Ok(IERC20::allowanceCall::abi_decode_returns(data, true)?._0)
}

/// `balanceOf(account)`
#[must_use]
pub fn balance_of_call(account: &Address) -> Bytes {
    IERC20::balanceOfCall {
        account: account.inner(),
    }
    .abi_encode()
    .into()
}

/// `mint(to, amount)`
#[must_use]
pub fn mint_call(to: &Address, amount: U256) -> Bytes {
    IMockToken::mintCall {
        to: to.inner(),
        amount,
    }
    .abi_encode()
    .into()
}

/// Reads the implementation address out of an `impl()` return word.
///
/// # Errors
///
/// Returns [`Error::AbiDecodeFailed`] if `data` is not a single clean
/// address word.
pub fn decode_impl(data: &[u8]) -> Result<Address> {
    if data.len() != 32 || data[..12].iter().any(|b| *b != 0) {
        return Err(Error::AbiDecodeFailed(format!(
            "impl(): expected a 32-byte address word, got {} bytes",
            data.len()
        )));
    }
    Ok(AlloyAddress::from_slice(&data[12..]).into())
}

/// Returns the 4-byte selector of `calldata`, if it has one.
#[must_use]
pub fn selector(calldata: &[u8]) -> Option<[u8; 4]> {
    calldata.get(..4).and_then(|s| s.try_into().ok())
}
