//! Core type definitions for the transaction ledger.
//!
//! A [`TransactionRecord`] is the local, durable view of one transfer: what
//! was sent, to whom, and where it is in its lifecycle. Status moves only
//! forward. Once a record is terminal it never changes again, no matter
//! what a late receipt or a retried poll claims.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::provider::{Address, TxHash};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of the transfer this ledger belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outgoing transfer initiated here.
    Sent,
    /// Incoming transfer observed on the account.
    Received,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => write!(f, "sent"),
            Self::Received => write!(f, "received"),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a tracked transaction.
///
/// `Pending` is the only non-terminal state. The four terminal states
/// record how tracking ended: a receipt with a success code (`Confirmed`),
/// a receipt with a failure code (`Failed`), the poll budget running out
/// with no receipt (`Timeout`), or the poll budget running out on errors
/// (`Error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Submitted, receipt not yet seen.
    Pending,
    /// Receipt arrived with a success code.
    Confirmed,
    /// Receipt arrived with a failure code.
    Failed,
    /// Poll budget exhausted without a receipt.
    Timeout,
    /// Poll budget exhausted with the final attempt erroring.
    Error,
}

impl RecordStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Error => write!(f, "error"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionRecord
// ---------------------------------------------------------------------------

/// One row of the local transaction ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Locally generated identifier (UUIDv4). Stable across restarts.
    pub id: Uuid,
    /// Network transaction hash, set once submission succeeds.
    pub hash: Option<TxHash>,
    /// Sending account.
    pub from: Address,
    /// Receiving account.
    pub to: Address,
    /// Amount in whole SHM, decimal string.
    pub amount: String,
    /// Optional free-text annotation carried from the payment request.
    pub message: Option<String>,
    /// Which side of the transfer this row records.
    pub direction: Direction,
    /// Lifecycle state. Moves forward only.
    pub status: RecordStatus,
    /// When the send was initiated (UTC).
    pub submitted_at: DateTime<Utc>,
    /// When the confirming receipt was seen. `None` until confirmed.
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Block the transaction landed in, from the receipt.
    pub block_number: Option<u64>,
    /// Failure detail for `failed` and `error` outcomes.
    pub error: Option<String>,
}

impl TransactionRecord {
    /// Fresh pending record for an outgoing transfer.
    pub fn new_sent(
        from: Address,
        to: Address,
        amount: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            hash: None,
            from,
            to,
            amount: amount.into(),
            message,
            direction: Direction::Sent,
            status: RecordStatus::Pending,
            submitted_at: Utc::now(),
            confirmed_at: None,
            block_number: None,
            error: None,
        }
    }

    /// Attaches the network hash once the wallet accepts the submission.
    pub fn attach_hash(&mut self, hash: TxHash) {
        self.hash = Some(hash);
    }

    /// Marks the record confirmed. Returns `false` without changes if the
    /// record is already terminal.
    pub fn mark_confirmed(&mut self, at: DateTime<Utc>, block_number: u64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RecordStatus::Confirmed;
        self.confirmed_at = Some(at);
        self.block_number = Some(block_number);
        true
    }

    /// Marks the record failed (receipt with a failure code). Returns
    /// `false` without changes if the record is already terminal.
    pub fn mark_failed(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RecordStatus::Failed;
        self.error = Some(reason.into());
        true
    }

    /// Marks the record timed out. Returns `false` without changes if the
    /// record is already terminal.
    pub fn mark_timeout(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RecordStatus::Timeout;
        self.error = Some("Transaction timeout - please check your wallet".to_string());
        true
    }

    /// Marks the record errored (poll budget exhausted on errors). Returns
    /// `false` without changes if the record is already terminal.
    pub fn mark_error(&mut self, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RecordStatus::Error;
        self.error = Some(reason.into());
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
