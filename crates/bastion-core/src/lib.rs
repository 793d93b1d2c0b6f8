//! Bastion Session Client Core Library
//!
//! This crate turns one owner signature into a verified session account
//! ("Bastion") with its own operator key.
//!
//! # Overview
//!
//! The owner signs a single EIP-712 approval that names an operator, a token,
//! a spending limit, an allowed origin and a salt. That signature is used
//! twice:
//!
//! 1. The factory derives the session address from it and checks it against
//!    the approval in `checkSig`
//! 2. Read as an [EIP-7702] authorization to the factory's implementation,
//!    it recovers to the session address and delegates its code
//!
//! This library provides:
//!
//! - **Approval**: the record, its EIP-712 domain and digest
//! - **Verification**: local vs. factory digest and signer recovery
//! - **Derivation**: session address lookup with salt retries
//! - **Delegation**: the EIP-7702 authorization built from the same signature
//! - **Allowance, Activation, Rotation**: the owner and operator transactions
//! - **RPC**: JSON-RPC transports, a node provider and wallet backends
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   session::SessionProtocol                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ resolver │ delegation │ allowance │ activation │  rotation  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  approval  │  verify  │ authorization │ transaction │ abi    │
//! ├─────────────────────────────────────────────────────────────┤
//! │        chain::{ChainReader, ChainWriter}  wallet::WalletSigner│
//! ├─────────────────────────────────────────────────────────────┤
//! │  rpc: RpcProvider │ Eip1193Wallet │ LocalSender │ Transport  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Building and Hashing an Approval
//!
//! ```rust
//! use bastion_core::approval::{ApprovalBuilder, ApprovalDomain, Salt};
//! use bastion_core::{Address, ProtocolConfig};
//!
//! let config = ProtocolConfig::new(Address::new([0xfa; 20]));
//! let operator = Address::new([0x11; 20]);
//!
//! let builder = ApprovalBuilder::new(
//!     operator,
//!     "0x0000000000000000000000000000000000000002",
//!     "100",
//!     &config.allowed_origin,
//! )
//! .unwrap();
//!
//! let approval = builder.build(Salt::random());
//! let digest = approval.digest(&ApprovalDomain::new(&config, 1)).unwrap();
//! ```
//!
//! ## The Wallet Payload
//!
//! ```rust
//! use bastion_core::approval::{ApprovalBuilder, ApprovalDomain, Salt};
//! use bastion_core::{Address, ProtocolConfig};
//!
//! let config = ProtocolConfig::new(Address::new([0xfa; 20]));
//! let approval = ApprovalBuilder::new(
//!     Address::new([0x11; 20]),
//!     "0x0000000000000000000000000000000000000002",
//!     "0.5",
//!     &config.allowed_origin,
//! )
//! .unwrap()
//! .build(Salt::random());
//!
//! let typed_data = approval.typed_data(&ApprovalDomain::new(&config, 11_155_111)).unwrap();
//! let payload = typed_data.to_rpc_value().unwrap();
//! assert_eq!(payload["primaryType"], "Approval");
//! assert_eq!(payload["domain"]["name"], "BastionFactory");
//! ```
//!
//! ## Dual Interpretation of a Signature
//!
//! ```rust
//! use bastion_core::authorization::authorization_signer;
//! use bastion_core::verify::approval_signer;
//! use bastion_core::{Address, B256, Keypair};
//!
//! let key = Keypair::generate();
//! let digest = B256::repeat_byte(0x42);
//! let signature = key.sign_prehash(&digest).unwrap();
//!
//! assert_eq!(approval_signer(&digest, &signature).unwrap(), key.address());
//! // Read as a delegation, the same bytes name some other account.
//! let authority = authorization_signer(&signature, 1, Address::new([0x1e; 20]));
//! assert_ne!(authority.ok(), Some(key.address()));
//! ```
//!
//! # Feature Flags
//!
//! - `http` (default): [`rpc::HttpTransport`], JSON-RPC over HTTP via
//!   `reqwest`
//!
//! # Security Considerations
//!
//! - Operator keys are generated per session and never persisted
//! - A signature is accepted only if the factory's digest matches the local
//!   one and the signer is the connected owner
//! - A delegation that does not recover to the session address aborts the run
//!
//! [EIP-7702]: https://eips.ethereum.org/EIPS/eip-7702

// Modules
pub mod abi;
pub mod activation;
pub mod address;
pub mod allowance;
pub mod approval;
pub mod authorization;
pub mod balance;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod delegation;
pub mod eip712;
pub mod error;
pub mod resolver;
pub mod rotation;
pub mod rpc;
pub mod session;
pub mod signature;
pub mod status;
pub mod transaction;
pub mod units;
pub mod verify;
pub mod wallet;

// Re-exports for convenience
pub use address::Address;
pub use approval::{Approval, ApprovalBuilder, Salt};
pub use authorization::{Authorization, SignedAuthorization};
pub use balance::Balance;
pub use chain::{ChainReader, ChainWriter, Receipt, TxHash, TxRequest};
pub use config::{ProtocolConfig, WalletConfig, WalletKind};
pub use crypto::Keypair;
pub use eip712::{Eip712Domain, TypedData};
pub use error::{Error, Result, RunError};
pub use session::{SessionOutcome, SessionProtocol, SessionRequest};
pub use signature::Signature;
pub use status::{Phase, RecordingStatus, StatusSink, TracingStatus};
pub use transaction::{Eip1559Transaction, Eip7702Transaction, TypedTransaction};
pub use wallet::{LocalWallet, WalletSigner};

// Re-export commonly used alloy types
pub use alloy_primitives::{B256, U256};
