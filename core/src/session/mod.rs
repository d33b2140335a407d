//! # Wallet Session
//!
//! The connection side of PayLink: a validated, self-healing session
//! against a [`WalletProvider`](crate::provider::WalletProvider).
//!
//! - [`state`] defines the observable vocabulary: [`ConnectionState`],
//!   [`SessionDetails`], and the broadcast [`SessionEvent`]s.
//! - [`validator`] probes a provider and scores connection strength.
//! - [`machine`] is [`WalletSession`] itself: connect, resume, disconnect,
//!   bounded auto-reconnect, health checks, and wallet push events.

pub mod error;
pub mod machine;
pub mod state;
pub mod validator;

pub use error::{SessionError, NO_ACCOUNTS_MESSAGE, WALLET_UNAVAILABLE_MESSAGE};
pub use machine::{WalletSession, NETWORK_CHANGED_MESSAGE};
pub use state::{ConnectionState, SessionDetails, SessionEvent};
pub use validator::{strength_label, validate, StatusLevel, ValidationReport};
