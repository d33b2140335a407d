//! # PayLinkDb — Durable Local Storage
//!
//! The persistence layer for the wallet session, built on sled's embedded
//! key-value store. It plays the role browser local storage played for the
//! original front-ends: survive a restart, remember who was connected, and
//! keep the transaction ledger.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                    | Value                      |
//! |-------------|------------------------|----------------------------|
//! | `records`   | record id (UUID, UTF-8)| `json(TransactionRecord)`  |
//! | `tx_hashes` | tx hash (0x-hex, UTF-8)| record id (UUID, UTF-8)    |
//! | `session`   | key (UTF-8)            | value (UTF-8)              |
//!
//! Records serialize as JSON rather than a binary codec: the ledger is
//! inspected by humans with `sled`-agnostic tooling more often than it is
//! read on a hot path, and the JSON shape matches what the HTTP API serves.

use sled::{Db, Tree};
use std::path::Path;
use uuid::Uuid;

use crate::provider::{Address, TxHash};
use crate::tracker::record::TransactionRecord;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Session Keys
// ---------------------------------------------------------------------------

/// Well-known key for the last successfully connected account.
const SESSION_LAST_ACCOUNT: &[u8] = b"last_connected_account";

/// Well-known key for the connection-status marker.
const SESSION_CONNECTION_STATUS: &[u8] = b"connection_status";

// ---------------------------------------------------------------------------
// PayLinkDb
// ---------------------------------------------------------------------------

/// Durable storage for session markers and the transaction ledger.
///
/// # Thread Safety
///
/// sled supports lock-free concurrent reads and serialized writes, so a
/// `PayLinkDb` can be shared across tasks via `Arc<PayLinkDb>` without
/// external synchronization.
#[derive(Debug, Clone)]
pub struct PayLinkDb {
    /// The underlying sled database handle.
    db: Db,
    /// Transaction records indexed by UUID.
    records: Tree,
    /// Reverse index: transaction hash -> record UUID.
    tx_hashes: Tree,
    /// Session markers (last account, connection status).
    session: Tree,
}

impl PayLinkDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database cleaned up on drop. For tests and the
    /// agent's ephemeral local mode.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree("records")?;
        let tx_hashes = db.open_tree("tx_hashes")?;
        let session = db.open_tree("session")?;
        Ok(Self {
            db,
            records,
            tx_hashes,
            session,
        })
    }

    // -- Record operations ----------------------------------------------------

    /// Persist a transaction record, updating the hash index when the
    /// record carries a hash. Upserts: called once at submission and again
    /// on every status change.
    pub fn put_record(&self, record: &TransactionRecord) -> StoreResult<()> {
        let key = record.id.to_string();
        let bytes = serde_json::to_vec(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.records.insert(key.as_bytes(), bytes)?;

        if let Some(hash) = &record.hash {
            self.tx_hashes
                .insert(hash.to_string().as_bytes(), key.as_bytes())?;
        }

        self.db.flush()?;
        Ok(())
    }

    /// Retrieve a record by its local id.
    pub fn get_record(&self, id: &Uuid) -> StoreResult<Option<TransactionRecord>> {
        match self.records.get(id.to_string().as_bytes())? {
            Some(bytes) => {
                let record: TransactionRecord = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Retrieve a record by its network hash via the reverse index.
    pub fn get_record_by_hash(&self, hash: &TxHash) -> StoreResult<Option<TransactionRecord>> {
        match self.tx_hashes.get(hash.to_string().as_bytes())? {
            Some(id_bytes) => {
                let id_str = std::str::from_utf8(&id_bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                let id = Uuid::parse_str(id_str)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                self.get_record(&id)
            }
            None => Ok(None),
        }
    }

    /// All records, newest submission first. The ledger stays small (one
    /// browser profile's worth of sends), so a full scan is fine.
    pub fn list_records(&self) -> StoreResult<Vec<TransactionRecord>> {
        let mut records = Vec::new();
        for entry in self.records.iter() {
            let (_key, bytes) = entry?;
            let record: TransactionRecord = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            records.push(record);
        }
        records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(records)
    }

    /// Number of records in the ledger.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    // -- Session markers ------------------------------------------------------

    /// Remember the account that last connected successfully, so the next
    /// startup can attempt a silent reconnect.
    pub fn set_last_account(&self, account: &Address) -> StoreResult<()> {
        self.session
            .insert(SESSION_LAST_ACCOUNT, account.to_string().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    /// The last connected account, if a marker exists and still parses.
    pub fn last_account(&self) -> StoreResult<Option<Address>> {
        match self.session.get(SESSION_LAST_ACCOUNT)? {
            Some(bytes) => {
                let s = std::str::from_utf8(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Address::parse(s).ok())
            }
            None => Ok(None),
        }
    }

    /// Forget the last-account marker. Part of explicit disconnect.
    pub fn clear_last_account(&self) -> StoreResult<()> {
        self.session.remove(SESSION_LAST_ACCOUNT)?;
        self.db.flush()?;
        Ok(())
    }

    /// Store the coarse connection-status marker.
    pub fn set_connection_status(&self, status: &str) -> StoreResult<()> {
        self.session
            .insert(SESSION_CONNECTION_STATUS, status.as_bytes())?;
        Ok(())
    }

    /// The stored connection-status marker, if any.
    pub fn connection_status(&self) -> StoreResult<Option<String>> {
        match self.session.get(SESSION_CONNECTION_STATUS)? {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    // -- Utility --------------------------------------------------------------

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
