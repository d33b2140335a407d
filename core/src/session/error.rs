//! Error types for the wallet session lifecycle.
//!
//! Every session operation that can fail returns a [`SessionError`]. This
//! enum is exhaustive over the failure modes of connect, reconnect, balance
//! refresh, and the push-event handlers.

use thiserror::Error;

use crate::provider::{ProviderError, ERR_USER_REJECTED};
use crate::store::StoreError;

/// Shown when no wallet can be reached at all. Embedders match on this
/// exact string when deriving display status, so it must not drift.
pub const WALLET_UNAVAILABLE_MESSAGE: &str =
    "MetaMask is not installed. Please install MetaMask to use this app.";

/// Shown when the wallet grants access but exposes an empty account list.
pub const NO_ACCOUNTS_MESSAGE: &str = "No accounts found. Please connect your wallet.";

/// Errors that can occur while driving a wallet session.
///
/// Variants that reach end users verbatim (`WalletUnavailable`,
/// `NoAccounts`, `UserRejected`) carry full sentences; the rest use the
/// usual lowercase fragments.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No injected wallet or provider transport is reachable.
    #[error("{}", WALLET_UNAVAILABLE_MESSAGE)]
    WalletUnavailable,

    /// The user declined the wallet prompt. Carries the wallet's own
    /// message, surfaced unchanged.
    #[error("{0}")]
    UserRejected(String),

    /// The wallet granted access but exposed no accounts.
    #[error("{}", NO_ACCOUNTS_MESSAGE)]
    NoAccounts,

    /// The wallet is on the wrong chain and the switch/add recovery did
    /// not land it on the expected one.
    #[error("wrong network: expected chain {expected}, wallet is on chain {got}")]
    WrongNetwork {
        /// The chain id the session requires.
        expected: u64,
        /// The chain id the wallet reported.
        got: u64,
    },

    /// The connection validator reported a hard failure.
    #[error("connection validation failed: {0}")]
    ValidationFailed(String),

    /// The requested operation needs a connected session.
    #[error("wallet session is not connected")]
    NotConnected,

    /// Auto-reconnect was requested but no account marker is stored.
    #[error("no previously connected account to restore")]
    NoStoredAccount,

    /// A reconnect task is already driving this session.
    #[error("reconnect already in progress")]
    ReconnectInProgress,

    /// The bounded reconnect budget ran out. Terminal until an explicit
    /// connect resets the counter.
    #[error("maximum reconnection attempts reached after {attempts} tries; manual reconnect required")]
    ReconnectExhausted {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// Durable storage failed underneath the session.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A provider failure with no dedicated variant above.
    #[error("provider error: {0}")]
    Provider(ProviderError),
}

impl From<ProviderError> for SessionError {
    /// Classifies provider failures into the session taxonomy: transport
    /// absence becomes [`WalletUnavailable`](Self::WalletUnavailable), a
    /// 4001 rejection becomes [`UserRejected`](Self::UserRejected) with the
    /// wallet's message, everything else is wrapped as-is.
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable => Self::WalletUnavailable,
            ProviderError::Rpc { code, message } if code == ERR_USER_REJECTED => {
                Self::UserRejected(message)
            }
            other => Self::Provider(other),
        }
    }
}
