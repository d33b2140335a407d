//! # Receipt Polling
//!
//! One background task per pending transaction, querying the provider for
//! a receipt every five seconds with a sixty-attempt budget. The budget's
//! end is classified by how the final stretch went: a receipt decides
//! `confirmed` or `failed`, silence decides `timeout`, and a failing
//! lookup on the last attempt decides `error` — "the network never mined
//! it" and "we could not ask the network" are different answers to give a
//! user.
//!
//! Pollers race shutdown at every sleep, so a draining agent never waits
//! out a five-minute budget.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{MAX_RECEIPT_POLLS, RECEIPT_POLL_INTERVAL};
use crate::provider::{ReceiptStatus, TxHash};

use super::{TrackerEvent, TransactionTracker};

/// Message recorded when a receipt reports on-chain failure.
const REVERTED_MESSAGE: &str = "Transaction failed on-chain";

impl TransactionTracker {
    /// Spawns the receipt poller for one pending record. The handle is
    /// retained for shutdown draining.
    pub(super) fn spawn_poller(self: &std::sync::Arc<Self>, id: Uuid, hash: TxHash) {
        let tracker = std::sync::Arc::clone(self);
        let handle = tokio::spawn(async move {
            tracker.poll_until_settled(id, hash).await;
        });
        self.pollers.lock().push(handle);
    }

    async fn poll_until_settled(self: &std::sync::Arc<Self>, id: Uuid, hash: TxHash) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut last_error: Option<String> = None;

        for attempt in 1..=MAX_RECEIPT_POLLS {
            tokio::select! {
                _ = tokio::time::sleep(RECEIPT_POLL_INTERVAL) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(%id, "poller received shutdown signal");
                        return;
                    }
                }
            }

            match self.provider.transaction_receipt(&hash).await {
                Ok(Some(receipt)) if receipt.status == ReceiptStatus::Success => {
                    info!(%id, hash = %hash, block = receipt.block_number, attempt, "transaction confirmed");
                    let record = self.mutate_record(id, |r| {
                        r.mark_confirmed(Utc::now(), receipt.block_number);
                    });
                    if let Some(record) = record {
                        let _ = self.events.send(TrackerEvent::Confirmed { record });
                    }
                    // The sender's balance moved; bring the session up to date.
                    if let Err(e) = self.session.refresh_balance().await {
                        debug!(error = %e, "balance refresh after confirmation failed");
                    }
                    return;
                }
                Ok(Some(receipt)) => {
                    warn!(%id, hash = %hash, block = receipt.block_number, "transaction reverted");
                    let record = self.mutate_record(id, |r| {
                        r.mark_failed(REVERTED_MESSAGE);
                    });
                    if let Some(record) = record {
                        let _ = self.events.send(TrackerEvent::Failed { record });
                    }
                    return;
                }
                Ok(None) => {
                    // Still pending. A clean "not yet" clears any earlier
                    // lookup failure.
                    last_error = None;
                }
                Err(e) => {
                    debug!(%id, attempt, error = %e, "receipt lookup failed");
                    let error = e.to_string();
                    last_error = Some(error.clone());
                    let _ = self.events.send(TrackerEvent::PollError { id, attempt, error });
                }
            }
        }

        // Budget spent. What we tell the user depends on whether the final
        // attempt could reach the network at all.
        match last_error {
            Some(error) => {
                warn!(%id, hash = %hash, error = %error, "receipt polling gave up on errors");
                let record = self.mutate_record(id, |r| {
                    r.mark_error(format!("receipt polling failed: {}", error));
                });
                if let Some(record) = record {
                    let _ = self.events.send(TrackerEvent::Failed { record });
                }
            }
            None => {
                warn!(%id, hash = %hash, polls = MAX_RECEIPT_POLLS, "transaction timed out");
                let record = self.mutate_record(id, |r| {
                    r.mark_timeout();
                });
                if let Some(record) = record {
                    let _ = self.events.send(TrackerEvent::TimedOut { record });
                }
            }
        }
    }
}
