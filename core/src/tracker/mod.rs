//! # Transaction Tracker
//!
//! The send side of PayLink: submit transfers, keep a durable ledger of
//! every one, and poll each pending transaction until it settles.
//!
//! The [`TransactionTracker`] owns the in-memory ledger (a [`DashMap`] by
//! record id plus a hash index) and mirrors every change into
//! [`PayLinkDb`], so a restarted agent picks up exactly where it left off
//! — including resuming receipt polls for transactions that were still
//! pending when the process died.
//!
//! Split payments are strictly sequential, and a failed item never aborts
//! the batch: each recipient either got paid or appears in the failure
//! list, with no item silently skipped.

pub mod poller;
pub mod record;
pub mod split;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::provider::{Address, ProviderError, TransactionRequest, TxHash, WalletProvider};
use crate::session::WalletSession;
use crate::store::{PayLinkDb, StoreError};
use crate::units::{format_shm, validate_amount, AmountError};

pub use record::{Direction, RecordStatus, TransactionRecord};
pub use split::{plan_custom, plan_equal, plan_percentage, SplitError, SplitItem};

/// Capacity of the tracker event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Events & Errors
// ---------------------------------------------------------------------------

/// Observable ledger happenings, broadcast to subscribers. Serialized the
/// same way as session events, for the same websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// The wallet accepted a submission; polling has started.
    Submitted {
        /// The pending record, hash attached.
        record: TransactionRecord,
    },
    /// A receipt with a success code arrived.
    Confirmed {
        /// The record in its confirmed form.
        record: TransactionRecord,
    },
    /// The record went terminal without confirming: reverted on-chain, or
    /// the poll budget ran out on errors. `record.status` says which.
    Failed {
        /// The record in its terminal form.
        record: TransactionRecord,
    },
    /// The poll budget ran out without ever seeing a receipt.
    TimedOut {
        /// The record in its timed-out form.
        record: TransactionRecord,
    },
    /// A single receipt lookup failed; polling continues.
    PollError {
        /// Record being polled.
        id: Uuid,
        /// 1-based poll attempt that failed.
        attempt: u32,
        /// What the provider said.
        error: String,
    },
}

/// Errors from submitting transfers.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Sending requires a connected session.
    #[error("wallet session is not connected")]
    NotConnected,

    /// The amount string failed validation.
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),

    /// The session's known balance cannot cover the transfer. Advisory:
    /// the wallet enforces the real check at submission.
    #[error("insufficient balance: tried to send {requested} SHM with {available} SHM available")]
    InsufficientBalance {
        /// Requested amount, decimal SHM.
        requested: String,
        /// Known balance, decimal SHM.
        available: String,
    },

    /// The wallet refused or failed the submission.
    #[error("transaction submission failed: {0}")]
    Provider(#[from] ProviderError),

    /// Durable storage failed underneath the ledger.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// One recipient that could not be paid during a split payment.
#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    /// Who was supposed to receive this share.
    pub recipient: Address,
    /// The share that failed, decimal SHM.
    pub amount: String,
    /// Why the item failed.
    pub error: String,
}

/// Outcome of a split payment: which items went through and which did not.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    /// Record ids of submitted items, in plan order.
    pub successes: Vec<Uuid>,
    /// Items that failed, in plan order.
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    /// True when every planned item was submitted.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TransactionTracker
// ---------------------------------------------------------------------------

/// Submits transfers and tracks them to a terminal status.
///
/// Shared as `Arc<TransactionTracker>`; pollers hold a clone. The ledger
/// maps are the source of truth at runtime, with every mutation written
/// through to the database before observers hear about it.
pub struct TransactionTracker {
    session: Arc<WalletSession>,
    pub(crate) provider: Arc<dyn WalletProvider>,
    db: PayLinkDb,
    records: DashMap<Uuid, TransactionRecord>,
    hash_index: DashMap<TxHash, Uuid>,
    pub(crate) pollers: Mutex<Vec<JoinHandle<()>>>,
    pub(crate) events: broadcast::Sender<TrackerEvent>,
    pub(crate) shutdown_tx: watch::Sender<bool>,
}

impl TransactionTracker {
    /// Creates a tracker over a session, restoring the ledger from
    /// storage. Call [`resume_polling`](Self::resume_polling) afterwards
    /// to pick pending transactions back up.
    pub fn new(session: Arc<WalletSession>) -> Result<Arc<Self>, TrackerError> {
        let provider = session.provider();
        let db = session.db().clone();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);

        let records = DashMap::new();
        let hash_index = DashMap::new();
        for record in db.list_records()? {
            if let Some(hash) = record.hash {
                hash_index.insert(hash, record.id);
            }
            records.insert(record.id, record);
        }
        info!(records = records.len(), "transaction ledger restored");

        Ok(Arc::new(Self {
            session,
            provider,
            db,
            records,
            hash_index,
            pollers: Mutex::new(Vec::new()),
            events,
            shutdown_tx,
        }))
    }

    /// Subscribes to tracker events.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.events.subscribe()
    }

    /// Restarts receipt polling for every pending record that has a hash.
    /// Call once after construction; safe to skip for a fresh ledger.
    pub fn resume_polling(self: &Arc<Self>) {
        let pending: Vec<(Uuid, TxHash)> = self
            .records
            .iter()
            .filter(|entry| entry.status == RecordStatus::Pending)
            .filter_map(|entry| entry.hash.map(|hash| (entry.id, hash)))
            .collect();
        for (id, hash) in pending {
            debug!(%id, hash = %hash, "resuming receipt poll");
            self.spawn_poller(id, hash);
        }
    }

    // -- Sending ------------------------------------------------------------

    /// Submits a transfer and starts tracking it.
    ///
    /// The amount is a decimal SHM string, validated and compared against
    /// the session's known balance before the wallet is asked to sign.
    /// Returns the pending ledger record, hash attached.
    pub async fn send(
        self: &Arc<Self>,
        to: Address,
        amount: &str,
        message: Option<String>,
    ) -> Result<TransactionRecord, TrackerError> {
        let details = self
            .session
            .state()
            .details()
            .cloned()
            .ok_or(TrackerError::NotConnected)?;

        let amount_base = validate_amount(amount)?;
        if amount_base > details.balance_base {
            return Err(TrackerError::InsufficientBalance {
                requested: format_shm(amount_base),
                available: details.balance.clone(),
            });
        }

        let request = TransactionRequest {
            from: Some(details.account),
            ..TransactionRequest::transfer(to, amount_base)
        };
        let hash = self.provider.send_transaction(&request).await?;

        let mut record =
            TransactionRecord::new_sent(details.account, to, format_shm(amount_base), message);
        record.attach_hash(hash);
        self.db.put_record(&record)?;
        self.hash_index.insert(hash, record.id);
        self.records.insert(record.id, record.clone());

        info!(id = %record.id, hash = %hash, to = %to, amount = %record.amount, "transaction submitted");
        let _ = self.events.send(TrackerEvent::Submitted {
            record: record.clone(),
        });
        self.spawn_poller(record.id, hash);
        Ok(record)
    }

    /// Executes a split-payment plan, one transfer at a time, in order.
    ///
    /// A failed item is recorded in the outcome and the batch continues;
    /// every later recipient still gets their attempt.
    pub async fn send_split(
        self: &Arc<Self>,
        plan: &[SplitItem],
        message: Option<&str>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome {
            successes: Vec::new(),
            failures: Vec::new(),
        };

        for item in plan {
            let amount = item.amount_display();
            match self
                .send(item.recipient, &amount, message.map(String::from))
                .await
            {
                Ok(record) => outcome.successes.push(record.id),
                Err(e) => {
                    warn!(recipient = %item.recipient, amount = %amount, error = %e, "split item failed");
                    outcome.failures.push(BulkFailure {
                        recipient: item.recipient,
                        amount,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            submitted = outcome.successes.len(),
            failed = outcome.failures.len(),
            "split payment finished"
        );
        outcome
    }

    // -- Ledger reads -------------------------------------------------------

    /// The ledger, newest submission first, optionally filtered by
    /// direction.
    pub fn history(&self, direction: Option<Direction>) -> Vec<TransactionRecord> {
        let mut records: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|entry| direction.map_or(true, |d| entry.direction == d))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        records
    }

    /// One record by local id.
    pub fn get(&self, id: &Uuid) -> Option<TransactionRecord> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    /// One record by network hash.
    pub fn by_hash(&self, hash: &TxHash) -> Option<TransactionRecord> {
        let id = *self.hash_index.get(hash)?;
        self.get(&id)
    }

    /// Number of records still pending.
    pub fn pending_count(&self) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.status == RecordStatus::Pending)
            .count()
    }

    // -- Internals ----------------------------------------------------------

    /// Mutates a record in place and writes it through to storage,
    /// returning the updated copy. `None` when the id is unknown.
    pub(crate) fn mutate_record(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut TransactionRecord),
    ) -> Option<TransactionRecord> {
        let mut entry = self.records.get_mut(&id)?;
        f(entry.value_mut());
        let record = entry.value().clone();
        drop(entry);
        if let Err(e) = self.db.put_record(&record) {
            warn!(%id, error = %e, "failed to persist record update");
        }
        Some(record)
    }

    /// Stops all receipt pollers and waits for them to exit. Pending
    /// records stay pending in storage; the next start resumes them.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.pollers.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
