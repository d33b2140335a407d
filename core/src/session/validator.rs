//! # Connection Validator
//!
//! Answers one question: can this wallet session be trusted right now?
//!
//! Three independent read-only probes run against the provider: account
//! balance, chain id, and fee data. Each success contributes a third of the
//! strength score; two out of three makes the connection "strong". The
//! balance probe is special: if it fails, the session is invalid outright,
//! because a wallet that cannot report the account's funds cannot support
//! anything else the session does. Fee and chain probe failures only
//! degrade the score.
//!
//! Latency is measured separately, as the wall-clock time of the cheapest
//! read the provider has (latest block number). A failed latency probe
//! yields no number rather than a fake one, and does not count against the
//! strength score.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config;
use crate::provider::{Address, WalletProvider};

use super::error::WALLET_UNAVAILABLE_MESSAGE;
use super::state::ConnectionState;

/// How many of the probes must succeed for a "strong" verdict.
const STRONG_PROBE_THRESHOLD: usize = 2;

/// Number of strength probes issued per validation pass.
const PROBE_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Validation Report
// ---------------------------------------------------------------------------

/// Outcome of a full validation pass.
///
/// The probed balance and chain id ride along so that connect paths do not
/// have to refetch what the probes already read.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// False exactly when the balance probe failed.
    pub valid: bool,
    /// Whether the reported chain id matches the expected chain.
    pub is_correct_network: bool,
    /// Chain id from the network probe, when it succeeded.
    pub network_id: Option<u64>,
    /// Balance from the balance probe, in base units.
    pub balance_base: Option<u128>,
    /// Round-trip time of the latency probe, when it succeeded.
    pub latency_ms: Option<u64>,
    /// Fraction of the strength probes that succeeded, in [0, 1].
    pub strength_score: f64,
    /// At least two of the three strength probes succeeded.
    pub connection_strong: bool,
    /// Why the session is invalid, present exactly when `valid` is false.
    pub error: Option<String>,
}

impl ValidationReport {
    /// Strength score as a whole percentage.
    pub fn strength_percent(&self) -> u8 {
        (self.strength_score * 100.0).round() as u8
    }

    /// Human label for the strength score.
    pub fn strength_label(&self) -> &'static str {
        strength_label(self.strength_score)
    }
}

/// Maps a strength score in [0, 1] to a display label.
pub fn strength_label(score: f64) -> &'static str {
    let percent = score * 100.0;
    if percent >= 90.0 {
        "Excellent"
    } else if percent >= 70.0 {
        "Good"
    } else if percent >= 50.0 {
        "Fair"
    } else {
        "Poor"
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Probes the provider and produces a [`ValidationReport`].
///
/// Never returns an error: every probe failure is folded into the report,
/// and callers decide what the verdict means for their state machine.
pub async fn validate(provider: &dyn WalletProvider, account: &Address) -> ValidationReport {
    // Latency first: wall-clock around the cheapest read.
    let started = Instant::now();
    let latency_ms = match provider.block_number().await {
        Ok(_) => Some(started.elapsed().as_millis() as u64),
        Err(e) => {
            debug!(error = %e, "latency probe failed");
            None
        }
    };

    // The three strength probes run concurrently; each failure counts
    // against the score without disturbing the others.
    let (balance, chain, fees) = tokio::join!(
        provider.balance(account),
        provider.chain_id(),
        provider.fee_data(),
    );

    let successes = [balance.is_ok(), chain.is_ok(), fees.is_ok()]
        .into_iter()
        .filter(|ok| *ok)
        .count();
    let strength_score = successes as f64 / PROBE_COUNT as f64;
    let connection_strong = successes >= STRONG_PROBE_THRESHOLD;

    let network_id = chain.ok();
    let is_correct_network = network_id == Some(config::SHARDEUM_CHAIN_ID);

    let (balance_base, error, valid) = match balance {
        Ok(base_units) => (Some(base_units), None, true),
        Err(e) => {
            warn!(account = %account, error = %e, "balance probe failed, session invalid");
            (None, Some(e.to_string()), false)
        }
    };

    debug!(
        valid,
        strength = format_args!("{}/{}", successes, PROBE_COUNT),
        latency_ms,
        correct_network = is_correct_network,
        "validation pass finished"
    );

    ValidationReport {
        valid,
        is_correct_network,
        network_id,
        balance_base,
        latency_ms,
        strength_score,
        connection_strong,
        error,
    }
}

// ---------------------------------------------------------------------------
// Status Levels
// ---------------------------------------------------------------------------

/// Coarse connection status for display surfaces.
///
/// Ordered from worst to best. Derived from the session state alone, so
/// any observer holding a state snapshot can compute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    /// No wallet provider is reachable at all.
    Unavailable,
    /// No session, or a connect still in flight.
    Disconnected,
    /// The session is in an error state.
    Error,
    /// Connected, but to the wrong chain.
    WrongNetwork,
    /// Connected with a degraded probe score.
    WeakConnection,
    /// Fully connected and healthy.
    Connected,
}

impl StatusLevel {
    /// Derives the display status from a session state snapshot.
    pub fn for_session(state: &ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected | ConnectionState::Connecting => Self::Disconnected,
            ConnectionState::Error { message } if message == WALLET_UNAVAILABLE_MESSAGE => {
                Self::Unavailable
            }
            ConnectionState::Error { .. } => Self::Error,
            ConnectionState::Connected(d) if d.network_id != config::SHARDEUM_CHAIN_ID => {
                Self::WrongNetwork
            }
            ConnectionState::Connected(d) if !d.connection_strong => Self::WeakConnection,
            ConnectionState::Connected(_) => Self::Connected,
        }
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unavailable => "unavailable",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::WrongNetwork => "wrong_network",
            Self::WeakConnection => "weak_connection",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
