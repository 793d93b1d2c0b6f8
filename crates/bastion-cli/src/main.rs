//! Bastion session CLI
//!
//! Creates and manages session accounts from the command line.
//!
//! # Quick Start
//!
//! ```bash
//! # Settings can come from flags, the environment or a .env file
//! export BASTION_RPC_URL=http://127.0.0.1:8545
//! export BASTION_FACTORY_ADDRESS=0x...
//! export BASTION_OWNER_KEY=0x...
//!
//! bastion operator                                  # Generate an operator key
//! bastion session --token 0x... --amount 100        # Create a session
//! bastion session --token 0x... --amount 100 --activate
//! bastion change-operator --session 0x...           # Rotate the operator key
//! bastion balance 0x...                             # Show a native balance
//! bastion mint-mock --to 0x...                      # Mint demo tokens
//! ```
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `operator` | Generate an operator key |
//! | `session` | Sign, verify and derive a session, settle the allowance |
//! | `change-operator` | Replace a session's operator with a fresh key |
//! | `balance <address>` | Show an account's native balance |
//! | `mint-mock` | Mint 100 base units of the mock token |
//!
//! # Wallets
//!
//! `--wallet local` (default) signs with `BASTION_OWNER_KEY`. `injected`,
//! `embedded` and `remote-custody` reach an EIP-1193 JSON-RPC wallet at
//! `BASTION_WALLET_URL`.
//!
//! # Security Notes
//!
//! - Operator private keys are printed once and never written to disk
//! - Store the owner key in the environment, not in shell history

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use bastion_core::chain::{self, TxRequest};
use bastion_core::config::DEFAULT_ALLOWED_ORIGIN;
use bastion_core::rpc::{HttpTransport, LocalSender, OwnerWallet, RpcProvider, RpcTransport};
use bastion_core::{
    Address, Balance, Keypair, ProtocolConfig, SessionProtocol, SessionRequest, TracingStatus,
    U256, WalletConfig, WalletKind, abi,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Base units minted by `mint-mock`.
const MOCK_MINT_AMOUNT: u64 = 100;

/// Create and manage Bastion session accounts.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(flatten)]
    network: NetworkArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct NetworkArgs {
    /// JSON-RPC endpoint of the chain.
    #[arg(long, env = "BASTION_RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// The session factory.
    #[arg(long, env = "BASTION_FACTORY_ADDRESS", global = true)]
    factory: Option<Address>,

    /// Origin the session may be used from.
    #[arg(long, env = "BASTION_ALLOWED_DOMAIN", global = true, default_value = DEFAULT_ALLOWED_ORIGIN)]
    allowed_domain: String,

    /// Owner wallet backend: local, injected, embedded or remote-custody.
    #[arg(long, env = "BASTION_WALLET", global = true, default_value = "local")]
    wallet: WalletKind,

    /// JSON-RPC endpoint of a provider wallet.
    #[arg(long, env = "BASTION_WALLET_URL", global = true)]
    wallet_url: Option<String>,

    /// Owner private key (hex) for the local wallet.
    #[arg(long, env = "BASTION_OWNER_KEY", global = true, hide_env_values = true)]
    owner_key: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an operator key.
    Operator,

    /// Create a session account for the owner.
    Session {
        /// ERC-20 token the session may spend.
        #[arg(long)]
        token: String,

        /// Spending limit in whole tokens (18 decimals).
        #[arg(long)]
        amount: String,

        /// Send the activation from the new operator key.
        #[arg(long)]
        activate: bool,
    },

    /// Replace the operator of an existing session.
    ChangeOperator {
        /// The session account.
        #[arg(long)]
        session: Address,
    },

    /// Show an account's native balance.
    Balance {
        /// The account to query.
        address: Address,
    },

    /// Mint mock tokens to an account.
    MintMock {
        /// Recipient.
        #[arg(long)]
        to: Address,

        /// The mock token.
        #[arg(long, env = "BASTION_MOCK_TOKEN_ADDRESS")]
        token: Address,
    },
}

impl NetworkArgs {
    fn protocol_config(&self) -> Result<ProtocolConfig> {
        let factory = self
            .factory
            .context("missing factory: pass --factory or set BASTION_FACTORY_ADDRESS")?;
        Ok(ProtocolConfig::new(factory).with_allowed_origin(self.allowed_domain.clone()))
    }

    fn wallet_config(&self) -> WalletConfig {
        WalletConfig {
            kind: self.wallet,
            endpoint: self.wallet_url.clone(),
            private_key: self.owner_key.clone(),
        }
    }

    fn provider(&self, config: &ProtocolConfig) -> Result<RpcProvider> {
        let url = self
            .rpc_url
            .as_deref()
            .context("missing RPC endpoint: pass --rpc-url or set BASTION_RPC_URL")?;
        let transport: Arc<dyn RpcTransport> =
            Arc::new(HttpTransport::new(url).context("failed to build RPC transport")?);
        Ok(RpcProvider::new(transport, config))
    }

    async fn owner(&self, provider: &RpcProvider) -> Result<OwnerWallet> {
        OwnerWallet::connect(&self.wallet_config(), provider.clone())
            .await
            .with_context(|| format!("failed to connect {} wallet", self.wallet))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Operator => cmd_operator(),
        Command::Session {
            ref token,
            ref amount,
            activate,
        } => cmd_session(&cli.network, token, amount, activate).await,
        Command::ChangeOperator { session } => cmd_change_operator(&cli.network, session).await,
        Command::Balance { address } => cmd_balance(&cli.network, address).await,
        Command::MintMock { to, token } => cmd_mint_mock(&cli.network, to, token).await,
    }
}

fn print_key(label: &str, key: &Keypair) {
    println!("{label} address:     {}", key.address());
    println!("{label} private key: {}", key.private_key_hex());
}

fn cmd_operator() -> Result<()> {
    print_key("Operator", &Keypair::generate());
    Ok(())
}

async fn cmd_session(network: &NetworkArgs, token: &str, amount: &str, activate: bool) -> Result<()> {
    let config = network.protocol_config()?;
    let provider = network.provider(&config)?;
    let owner = network.owner(&provider).await?;
    let status = TracingStatus;
    let protocol = SessionProtocol::new(&config, &provider, &status)?;

    let outcome = protocol
        .create_session(&owner, &owner, SessionRequest::new(token, amount))
        .await
        .context("session creation failed")?;

    println!("Session address:      {}", outcome.session);
    println!("Derivation attempts:  {}", outcome.attempts);
    print_key("Operator", &outcome.operator);

    if activate {
        let balance = Balance::refresh(&provider, outcome.operator.address()).await;
        println!("Operator balance:     {balance}");

        let sender = LocalSender::new(outcome.operator.clone(), outcome.chain_id, provider.clone());
        let receipt = protocol
            .activate(&outcome, &sender)
            .await
            .context("activation failed")?;
        println!("Activated in:         {}", receipt.transaction_hash);
    } else {
        println!(
            "Fund {} with at least {} wei, then activate.",
            outcome.operator.address(),
            config.min_activation_balance
        );
    }
    Ok(())
}

async fn cmd_change_operator(network: &NetworkArgs, session: Address) -> Result<()> {
    let config = network.protocol_config()?;
    let provider = network.provider(&config)?;
    let owner = network.owner(&provider).await?;
    let status = TracingStatus;
    let protocol = SessionProtocol::new(&config, &provider, &status)?;

    let operator = protocol
        .rotate_operator(&owner, &owner, session)
        .await
        .context("operator rotation failed")?;

    println!("Session address:      {session}");
    print_key("New operator", &operator);
    Ok(())
}

async fn cmd_balance(network: &NetworkArgs, address: Address) -> Result<()> {
    // Balance reads never touch the factory.
    let config = ProtocolConfig::new(network.factory.unwrap_or_else(Address::zero));
    let provider = network.provider(&config)?;
    println!("{address}: {}", Balance::refresh(&provider, address).await);
    Ok(())
}

async fn cmd_mint_mock(network: &NetworkArgs, to: Address, token: Address) -> Result<()> {
    let config = ProtocolConfig::new(network.factory.unwrap_or_else(Address::zero));
    let provider = network.provider(&config)?;
    let owner = network.owner(&provider).await?;
    if token.is_zero() {
        return Err(anyhow!("mock token address is zero"));
    }

    let request = TxRequest::call(
        owner.account(),
        token,
        abi::mint_call(&to, U256::from(MOCK_MINT_AMOUNT)),
    );
    let receipt = chain::send_and_confirm(&owner, request)
        .await
        .context("mint failed")?;
    info!(%to, %token, "minted mock tokens");
    println!("Minted {MOCK_MINT_AMOUNT} to {to} in {}", receipt.transaction_hash);
    Ok(())
}
