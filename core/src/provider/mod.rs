//! # Wallet Provider Module
//!
//! The seam between session logic and whatever is actually signing
//! transactions. Everything above this module speaks [`WalletProvider`];
//! everything below it speaks a concrete wallet's RPC dialect.
//!
//! ## Architecture
//!
//! ```text
//! types.rs — Vocabulary (Address, TxHash, ChainDescriptor, FeeData, receipts)
//! sim.rs   — SimulatedWallet: an in-memory provider with failure injection
//! ```
//!
//! ## Design Decisions
//!
//! - The trait is object-safe and `Send + Sync` so sessions can hold an
//!   `Arc<dyn WalletProvider>` and background tasks can probe it freely.
//! - Push notifications (account and chain changes) arrive on a broadcast
//!   channel rather than callbacks. Slow consumers lag, they don't block
//!   the provider.
//! - RPC failures keep their numeric code. 4001 (user rejected) and 4902
//!   (unrecognized chain) drive real control flow during connect.

pub mod sim;
pub mod types;

pub use sim::SimulatedWallet;
pub use types::{
    Address, ChainDescriptor, FeeData, HexParseError, NativeCurrency, ReceiptStatus,
    TransactionReceipt, TransactionRequest, TxHash,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// EIP-1193 error code for a user-rejected request.
pub const ERR_USER_REJECTED: i64 = 4001;

/// EIP-3085 error code for a chain the wallet does not know yet.
pub const ERR_UNRECOGNIZED_CHAIN: i64 = 4902;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by a wallet provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No provider is reachable at all.
    #[error("wallet provider is not available")]
    Unavailable,

    /// The wallet answered with a structured RPC error.
    #[error("wallet rpc error {code}: {message}")]
    Rpc {
        /// EIP-1193 / JSON-RPC error code.
        code: i64,
        /// Wallet-supplied message.
        message: String,
    },

    /// The transport to the wallet failed before an answer arrived.
    #[error("provider transport error: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Convenience constructor for a structured RPC error.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// The user clicked reject in the wallet prompt.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == ERR_USER_REJECTED)
    }

    /// The wallet has never heard of the requested chain and needs an
    /// add-chain call before it can switch.
    pub fn is_unrecognized_chain(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == ERR_UNRECOGNIZED_CHAIN)
    }
}

// ---------------------------------------------------------------------------
// Push Events
// ---------------------------------------------------------------------------

/// Unsolicited notifications a wallet pushes at the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WalletPushEvent {
    /// The set of exposed accounts changed. An empty list means the user
    /// disconnected the site from the wallet.
    AccountsChanged {
        /// The new account list, selected account first.
        accounts: Vec<Address>,
    },
    /// The wallet moved to a different chain.
    ChainChanged {
        /// The new chain id, decimal.
        chain_id: u64,
    },
}

// ---------------------------------------------------------------------------
// WalletProvider
// ---------------------------------------------------------------------------

/// The operations a session needs from a wallet.
///
/// Method names track the underlying RPC vocabulary: `request_accounts` is
/// the interactive prompt (`eth_requestAccounts`), `accounts` is the silent
/// query (`eth_accounts`), and so on. All read methods must be safe to call
/// concurrently from health checks and validators.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompts the user for account access and returns the granted list.
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// Silently returns the currently exposed accounts, empty if none.
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError>;

    /// The chain the wallet is currently on, decimal.
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    /// Native balance of an account, in base units.
    async fn balance(&self, address: &Address) -> Result<u128, ProviderError>;

    /// Current fee quote.
    async fn fee_data(&self) -> Result<FeeData, ProviderError>;

    /// Latest block number. The cheapest read the provider has, which is
    /// why latency is measured against it.
    async fn block_number(&self) -> Result<u64, ProviderError>;

    /// Asks the wallet to switch to the given chain.
    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError>;

    /// Registers a chain the wallet does not know yet.
    async fn add_chain(&self, descriptor: &ChainDescriptor) -> Result<(), ProviderError>;

    /// Hands a transfer to the wallet for signing and broadcast.
    async fn send_transaction(&self, request: &TransactionRequest)
        -> Result<TxHash, ProviderError>;

    /// Receipt lookup. `Ok(None)` means the transaction is still pending.
    async fn transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;

    /// Subscribes to account and chain push notifications.
    fn subscribe(&self) -> broadcast::Receiver<WalletPushEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_code_helpers() {
        let rejected = ProviderError::rpc(ERR_USER_REJECTED, "User rejected the request.");
        assert!(rejected.is_user_rejection());
        assert!(!rejected.is_unrecognized_chain());

        let unknown_chain = ProviderError::rpc(ERR_UNRECOGNIZED_CHAIN, "Unrecognized chain ID");
        assert!(unknown_chain.is_unrecognized_chain());
        assert!(!unknown_chain.is_user_rejection());

        assert!(!ProviderError::Unavailable.is_user_rejection());
    }

    #[test]
    fn push_event_serde_shape() {
        let ev = WalletPushEvent::ChainChanged { chain_id: 8083 };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "chain_changed");
        assert_eq!(json["chain_id"], 8083);

        let ev = WalletPushEvent::AccountsChanged { accounts: vec![] };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "accounts_changed");
    }
}
