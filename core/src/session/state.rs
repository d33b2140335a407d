//! # Session State Vocabulary
//!
//! The observable shape of a wallet connection: the lifecycle enum, the
//! details attached while connected, and the events the session broadcasts.
//!
//! [`ConnectionState`] is deliberately an enum with payload rather than a
//! struct of optionals: account and network id exist exactly when the
//! session is connected, and the type makes any other combination
//! unrepresentable. Only `WalletSession` constructs transitions; everything
//! else reads snapshots or subscribes to [`SessionEvent`]s.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Address;

/// Serde representation of base-unit amounts. Eighteen-decimal balances
/// overflow a JSON number's u64 range past 18.4 SHM, so the wire form is a
/// decimal string.
mod base_units {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Session Details
// ---------------------------------------------------------------------------

/// Attributes of a live wallet connection.
///
/// Exists exactly while the session is [`ConnectionState::Connected`].
/// `balance` is the display string, `balance_base` the same value in base
/// units for arithmetic; the two are always written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    /// The selected wallet account.
    pub account: Address,
    /// Chain id the session was established against.
    pub network_id: u64,
    /// Native balance as a decimal SHM string.
    pub balance: String,
    /// The same balance in base units.
    #[serde(with = "base_units")]
    pub balance_base: u128,
    /// Round-trip time of the latency probe, absent when the probe failed.
    pub latency_ms: Option<u64>,
    /// Whether at least two of the three connection probes succeeded.
    pub connection_strong: bool,
    /// When any of these fields was last written.
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Connection State
// ---------------------------------------------------------------------------

/// The wallet-connection lifecycle.
///
/// ```text
/// Disconnected --connect()--> Connecting --ok--> Connected
///       ^                         |                  |
///       |                    fail |   health/refresh | failure,
///       |                         v   chain change   v
///       +----disconnect()------ Error <--------------+
///                                 ^  \
///                                 |   \--reconnect--> Connecting
///                  budget spent---+
/// ```
///
/// Any state reaches `Disconnected` through an explicit disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session. The starting state and the result of an explicit
    /// disconnect.
    Disconnected,
    /// A connect or reconnect attempt is in flight.
    Connecting,
    /// Live session with validated details.
    Connected(SessionDetails),
    /// The session broke. The message says why; leaving this state takes a
    /// reconnect or an explicit connect.
    Error {
        /// User-facing description of what went wrong.
        message: String,
    },
}

impl ConnectionState {
    /// Short lowercase name, used for the persisted status marker and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected(_) => "connected",
            Self::Error { .. } => "error",
        }
    }

    /// True when a live session exists.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Connection details, present exactly when connected.
    pub fn details(&self) -> Option<&SessionDetails> {
        match self {
            Self::Connected(details) => Some(details),
            _ => None,
        }
    }

    /// The error message, present exactly in the error state.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Session Events
// ---------------------------------------------------------------------------

/// Observable session happenings, broadcast to subscribers.
///
/// The serialized form feeds the agent's websocket, so the shape is part of
/// the public surface: a snake_case `event` tag plus the variant fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The lifecycle state moved.
    StateChanged {
        /// The state just entered.
        state: ConnectionState,
    },
    /// The connected account's balance was re-read.
    BalanceRefreshed {
        /// Account whose balance was read.
        account: Address,
        /// New balance as a decimal SHM string.
        balance: String,
    },
    /// The wallet switched to a different account without dropping the
    /// session.
    AccountSwapped {
        /// Account the session was on.
        previous: Address,
        /// Account the session is on now.
        current: Address,
    },
    /// A periodic health check finished.
    HealthCheck {
        /// Whether the validator considered the session valid.
        healthy: bool,
        /// Latency probe result.
        latency_ms: Option<u64>,
        /// Strength verdict from the probe score.
        connection_strong: bool,
    },
    /// A reconnect attempt is about to run.
    ReconnectScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// The fixed attempt budget.
        max_attempts: u32,
    },
    /// The reconnect budget is spent; a manual connect is required.
    ReconnectExhausted {
        /// How many attempts were made.
        attempts: u32,
    },
    /// The wallet moved to a different chain and the session was
    /// terminated.
    ChainChanged {
        /// The chain the wallet is on now.
        chain_id: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> SessionDetails {
        SessionDetails {
            account: Address::from_bytes([0x11; 20]),
            network_id: 8083,
            balance: "5.0".to_string(),
            balance_base: 5_000_000_000_000_000_000,
            latency_ms: Some(42),
            connection_strong: true,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn labels_cover_every_state() {
        assert_eq!(ConnectionState::Disconnected.label(), "disconnected");
        assert_eq!(ConnectionState::Connecting.label(), "connecting");
        assert_eq!(ConnectionState::Connected(details()).label(), "connected");
        assert_eq!(
            ConnectionState::Error {
                message: "boom".to_string()
            }
            .label(),
            "error"
        );
    }

    #[test]
    fn details_present_iff_connected() {
        assert!(ConnectionState::Disconnected.details().is_none());
        assert!(ConnectionState::Connecting.details().is_none());
        assert!(ConnectionState::Error {
            message: "x".to_string()
        }
        .details()
        .is_none());

        let state = ConnectionState::Connected(details());
        assert!(state.is_connected());
        assert_eq!(state.details().map(|d| d.network_id), Some(8083));
    }

    #[test]
    fn state_serializes_with_tag() {
        let json = serde_json::to_string(&ConnectionState::Disconnected).unwrap();
        assert_eq!(json, r#"{"state":"disconnected"}"#);

        let json = serde_json::to_string(&ConnectionState::Connected(details())).unwrap();
        assert!(json.contains(r#""state":"connected""#));
        assert!(json.contains(r#""network_id":8083"#));
        assert!(json.contains(r#""balance_base":"5000000000000000000""#));

        let back: ConnectionState = serde_json::from_str(&json).unwrap();
        assert!(back.is_connected());
    }

    #[test]
    fn large_balances_survive_the_wire() {
        // 1,000,000 SHM in base units does not fit a u64.
        let mut d = details();
        d.balance_base = 1_000_000u128 * 1_000_000_000_000_000_000u128;
        d.balance = "1000000.0".to_string();

        let json = serde_json::to_string(&ConnectionState::Connected(d.clone())).unwrap();
        let back: ConnectionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.details().map(|d| d.balance_base), Some(d.balance_base));
    }

    #[test]
    fn event_serializes_with_tag() {
        let ev = SessionEvent::ReconnectScheduled {
            attempt: 2,
            max_attempts: 5,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(r#""event":"reconnect_scheduled""#));
        assert!(json.contains(r#""attempt":2"#));

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
