//! # Wallet Session State Machine
//!
//! [`WalletSession`] owns the connection lifecycle end to end: connect,
//! disconnect, silent resume, bounded auto-reconnect, periodic health
//! checks, and the wallet's push notifications. Nothing else in the crate
//! writes [`ConnectionState`]; everything else reads snapshots or
//! subscribes to [`SessionEvent`]s.
//!
//! ## How it works
//!
//! A connect attempt walks a fixed pipeline: request accounts, land the
//! wallet on the expected chain (switching once, adding the chain when the
//! wallet has never seen it), run the validator, and only then publish
//! `Connected` with the probed details. Every failure along the pipeline
//! parks the session in `Error` with the failure's own message.
//!
//! Auto-reconnect is a bounded retry, not a backoff: five attempts, three
//! seconds apart. A wallet that has been gone for fifteen seconds needs a
//! human, and the budget makes sure the machine stops asking before the
//! human gets annoyed. After exhaustion the session stays in `Error` and
//! every further `auto_reconnect` call is a no-op until someone calls
//! `connect()` again.
//!
//! ## Shutdown
//!
//! Background tasks (the health loop and the wallet event pump) monitor a
//! `tokio::sync::watch` channel and exit cleanly when it fires. An
//! in-flight provider call is never raced against shutdown — it completes
//! and its result is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{
    BALANCE_RETRY_ATTEMPTS, BALANCE_RETRY_STEP, HEALTH_CHECK_INTERVAL, MAX_RECONNECT_ATTEMPTS,
    RECONNECT_DELAY, SHARDEUM_CHAIN_ID,
};
use crate::provider::{
    Address, ChainDescriptor, ProviderError, WalletProvider, WalletPushEvent,
};
use crate::store::PayLinkDb;
use crate::units::format_shm;

use super::error::SessionError;
use super::state::{ConnectionState, SessionDetails, SessionEvent};
use super::validator::{validate, ValidationReport};

/// Capacity of the session event channel. Observers that fall further
/// behind than this lose the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Error-state message after a wallet-side chain switch. The session
/// cannot be trusted across a silent network swap, so embedders must tear
/// down and connect from scratch.
pub const NETWORK_CHANGED_MESSAGE: &str =
    "Network changed - please reconnect to continue";

// ---------------------------------------------------------------------------
// Balance Retry
// ---------------------------------------------------------------------------

/// Fetches a balance with the shared retry policy: three attempts, with
/// attempt `n` waiting `n` seconds before retrying.
pub(crate) async fn fetch_balance_with_retry(
    provider: &dyn WalletProvider,
    account: &Address,
) -> Result<u128, ProviderError> {
    let mut last_error = None;
    for attempt in 1..=BALANCE_RETRY_ATTEMPTS {
        match provider.balance(account).await {
            Ok(base_units) => return Ok(base_units),
            Err(e) => {
                debug!(attempt, error = %e, "balance fetch failed");
                last_error = Some(e);
                if attempt < BALANCE_RETRY_ATTEMPTS {
                    tokio::time::sleep(BALANCE_RETRY_STEP * attempt).await;
                }
            }
        }
    }
    Err(last_error.unwrap_or(ProviderError::Unavailable))
}

// ---------------------------------------------------------------------------
// WalletSession
// ---------------------------------------------------------------------------

/// The wallet-connection state machine.
///
/// Shared as `Arc<WalletSession>`; all methods take `&self`. The provider
/// trait object is immutable for the session's lifetime — what changes
/// atomically on connect/disconnect is the state behind the lock, so no
/// reader ever observes a half-updated session.
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    db: PayLinkDb,
    state: RwLock<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    /// At most one reconnect loop may drive the session at a time.
    reconnecting: AtomicBool,
    /// Set once the reconnect budget is spent; cleared by a successful
    /// connect. While set, `auto_reconnect` is a no-op.
    reconnect_exhausted: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WalletSession {
    /// Creates a session over a provider and a storage handle. The session
    /// starts `Disconnected`; call [`connect`](Self::connect) or
    /// [`resume`](Self::resume) to bring it up, and
    /// [`spawn_background_tasks`](Self::spawn_background_tasks) to start
    /// the health loop and event pump.
    pub fn new(provider: Arc<dyn WalletProvider>, db: PayLinkDb) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            provider,
            db,
            state: RwLock::new(ConnectionState::Disconnected),
            events,
            reconnecting: AtomicBool::new(false),
            reconnect_exhausted: AtomicBool::new(false),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The provider this session drives. Shared read-only with pollers and
    /// validators.
    pub fn provider(&self) -> Arc<dyn WalletProvider> {
        Arc::clone(&self.provider)
    }

    /// The storage handle backing this session.
    pub fn db(&self) -> &PayLinkDb {
        &self.db
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Interactive connect: prompts the wallet for account access, lands it
    /// on the expected chain, validates, and publishes `Connected`.
    ///
    /// On success the reconnect budget is reset and the account is
    /// persisted as the last-connected marker so a later startup can
    /// [`resume`](Self::resume) silently. On failure the session moves to
    /// `Error` with the failure's message and the error is returned.
    pub async fn connect(&self) -> Result<SessionDetails, SessionError> {
        self.establish(true).await
    }

    /// Silent startup reconnection. No-op (`Ok(None)`) when no
    /// last-connected marker exists; otherwise attempts a single
    /// non-interactive connect using the wallet's already-exposed accounts.
    pub async fn resume(&self) -> Result<Option<SessionDetails>, SessionError> {
        if self.db.last_account()?.is_none() {
            debug!("no stored account, skipping resume");
            return Ok(None);
        }
        info!("stored account found, attempting silent reconnect");
        self.establish(false).await.map(Some)
    }

    /// Explicit disconnect: clears session details and persisted markers.
    /// Idempotent; safe to call from any state.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.db.clear_last_account()?;
        self.reconnect_exhausted.store(false, Ordering::SeqCst);
        let already = matches!(*self.state.read(), ConnectionState::Disconnected);
        if !already {
            self.set_state(ConnectionState::Disconnected);
            info!("wallet session disconnected");
        }
        Ok(())
    }

    /// Bounded auto-reconnect: up to five attempts, three seconds apart,
    /// each driving the state through `Connecting`.
    ///
    /// Requires a persisted last-connected marker. Exhausting the budget
    /// parks the session in `Error` with a terminal message; further calls
    /// return [`SessionError::ReconnectExhausted`] without attempting
    /// anything until an explicit [`connect`](Self::connect) succeeds.
    pub async fn auto_reconnect(&self) -> Result<SessionDetails, SessionError> {
        if self.reconnect_exhausted.load(Ordering::SeqCst) {
            return Err(SessionError::ReconnectExhausted {
                attempts: MAX_RECONNECT_ATTEMPTS,
            });
        }
        self.db.last_account()?.ok_or(SessionError::NoStoredAccount)?;
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::ReconnectInProgress);
        }

        let result = self.reconnect_loop().await;
        self.reconnecting.store(false, Ordering::SeqCst);
        result
    }

    async fn reconnect_loop(&self) -> Result<SessionDetails, SessionError> {
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            let _ = self.events.send(SessionEvent::ReconnectScheduled {
                attempt,
                max_attempts: MAX_RECONNECT_ATTEMPTS,
            });
            info!(attempt, max = MAX_RECONNECT_ATTEMPTS, "reconnect attempt scheduled");
            tokio::time::sleep(RECONNECT_DELAY).await;

            match self.establish(false).await {
                Ok(details) => {
                    info!(attempt, account = %details.account, "reconnected");
                    return Ok(details);
                }
                Err(e) => warn!(attempt, error = %e, "reconnect attempt failed"),
            }
        }

        self.reconnect_exhausted.store(true, Ordering::SeqCst);
        let error = SessionError::ReconnectExhausted {
            attempts: MAX_RECONNECT_ATTEMPTS,
        };
        self.set_state(ConnectionState::Error {
            message: error.to_string(),
        });
        let _ = self.events.send(SessionEvent::ReconnectExhausted {
            attempts: MAX_RECONNECT_ATTEMPTS,
        });
        Err(error)
    }

    /// Shared connect pipeline. `interactive` chooses between the wallet
    /// prompt and the silent account query.
    async fn establish(&self, interactive: bool) -> Result<SessionDetails, SessionError> {
        self.set_state(ConnectionState::Connecting);

        match self.try_establish(interactive).await {
            Ok(details) => {
                self.db.set_last_account(&details.account)?;
                self.reconnect_exhausted.store(false, Ordering::SeqCst);
                self.set_state(ConnectionState::Connected(details.clone()));
                info!(
                    account = %details.account,
                    balance = %details.balance,
                    latency_ms = details.latency_ms,
                    "wallet session connected"
                );
                Ok(details)
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.set_state(ConnectionState::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn try_establish(&self, interactive: bool) -> Result<SessionDetails, SessionError> {
        let accounts = if interactive {
            self.provider.request_accounts().await?
        } else {
            self.provider.accounts().await?
        };
        let account = *accounts.first().ok_or(SessionError::NoAccounts)?;

        self.ensure_expected_chain().await?;

        let report = validate(self.provider.as_ref(), &account).await;
        if !report.valid {
            return Err(SessionError::ValidationFailed(
                report
                    .error
                    .unwrap_or_else(|| "connection probes failed".to_string()),
            ));
        }
        if !report.is_correct_network {
            return Err(SessionError::WrongNetwork {
                expected: SHARDEUM_CHAIN_ID,
                got: report.network_id.unwrap_or(0),
            });
        }

        Ok(details_from_report(account, &report))
    }

    /// Lands the wallet on the expected chain, recovering a mismatch once
    /// via switch-chain, with add-chain as the fallback when the wallet has
    /// never heard of the chain (code 4902).
    async fn ensure_expected_chain(&self) -> Result<(), SessionError> {
        let chain = self.provider.chain_id().await?;
        if chain == SHARDEUM_CHAIN_ID {
            return Ok(());
        }

        info!(got = chain, expected = SHARDEUM_CHAIN_ID, "wrong chain, requesting switch");
        match self.provider.switch_chain(SHARDEUM_CHAIN_ID).await {
            Ok(()) => {}
            Err(e) if e.is_unrecognized_chain() => {
                info!("chain unknown to wallet, requesting add");
                self.provider.add_chain(&ChainDescriptor::shardeum()).await?;
                self.provider.switch_chain(SHARDEUM_CHAIN_ID).await?;
            }
            Err(e) => return Err(e.into()),
        }

        let chain = self.provider.chain_id().await?;
        if chain != SHARDEUM_CHAIN_ID {
            return Err(SessionError::WrongNetwork {
                expected: SHARDEUM_CHAIN_ID,
                got: chain,
            });
        }
        Ok(())
    }

    // -- Balance ------------------------------------------------------------

    /// Re-reads the connected account's balance with the shared retry
    /// policy and updates the session details.
    ///
    /// A connectivity-flavored failure (transport down, provider gone)
    /// moves the session to `Error` and schedules auto-reconnect; other
    /// failures surface without a transition.
    pub async fn refresh_balance(self: &Arc<Self>) -> Result<String, SessionError> {
        let account = self
            .state
            .read()
            .details()
            .map(|d| d.account)
            .ok_or(SessionError::NotConnected)?;

        match fetch_balance_with_retry(self.provider.as_ref(), &account).await {
            Ok(base_units) => {
                let display_balance = format_shm(base_units);
                {
                    let mut state = self.state.write();
                    if let ConnectionState::Connected(details) = &mut *state {
                        details.balance = display_balance.clone();
                        details.balance_base = base_units;
                        details.last_updated = Utc::now();
                    }
                }
                debug!(account = %account, balance = %display_balance, "balance refreshed");
                let _ = self.events.send(SessionEvent::BalanceRefreshed {
                    account,
                    balance: display_balance.clone(),
                });
                Ok(display_balance)
            }
            Err(e) if is_connectivity_error(&e) => {
                warn!(error = %e, "balance refresh lost the provider, scheduling reconnect");
                self.set_state(ConnectionState::Error {
                    message: e.to_string(),
                });
                self.schedule_reconnect();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    // -- Background tasks ---------------------------------------------------

    /// Starts the periodic health check and the wallet event pump. Call
    /// once after construction; tasks run until [`shutdown`](Self::shutdown).
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let mut tasks = self.tasks.lock();

        let session = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; the cadence starts after it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => session.run_health_check().await,
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            debug!("health loop received shutdown signal");
                            break;
                        }
                    }
                }
            }
        }));

        let session = Arc::clone(self);
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut wallet_events = self.provider.subscribe();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = wallet_events.recv() => match event {
                        Ok(WalletPushEvent::AccountsChanged { accounts }) => {
                            session.handle_accounts_changed(accounts).await;
                        }
                        Ok(WalletPushEvent::ChainChanged { chain_id }) => {
                            session.handle_chain_changed(chain_id).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(missed = n, "wallet event pump lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            debug!("event pump received shutdown signal");
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Stops the background tasks and waits for them to exit. In-flight
    /// provider calls complete; their results are discarded.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn run_health_check(self: &Arc<Self>) {
        let account = match self.state.read().details() {
            Some(details) => details.account,
            None => return,
        };

        let report = validate(self.provider.as_ref(), &account).await;
        let _ = self.events.send(SessionEvent::HealthCheck {
            healthy: report.valid,
            latency_ms: report.latency_ms,
            connection_strong: report.connection_strong,
        });

        if report.valid {
            // Refresh the connection-detail attributes only; account and
            // balance are untouched by a health pass.
            let mut state = self.state.write();
            if let ConnectionState::Connected(details) = &mut *state {
                details.latency_ms = report.latency_ms;
                details.connection_strong = report.connection_strong;
                details.last_updated = Utc::now();
            }
        } else {
            let message = report
                .error
                .unwrap_or_else(|| "health check failed".to_string());
            warn!(message = %message, "health check failed, scheduling reconnect");
            self.set_state(ConnectionState::Error { message });
            self.schedule_reconnect();
        }
    }

    async fn handle_accounts_changed(self: &Arc<Self>, accounts: Vec<Address>) {
        let Some(current) = accounts.first().copied() else {
            // The user disconnected the app from the wallet side.
            info!("wallet exposed zero accounts, disconnecting");
            if let Err(e) = self.disconnect().await {
                warn!(error = %e, "disconnect after accounts-changed failed");
            }
            return;
        };

        let previous = match self.state.read().details() {
            Some(details) => details.account,
            None => return,
        };
        if previous == current {
            return;
        }

        info!(previous = %previous, current = %current, "wallet switched accounts");
        {
            let mut state = self.state.write();
            if let ConnectionState::Connected(details) = &mut *state {
                details.account = current;
                details.last_updated = Utc::now();
            }
        }
        if let Err(e) = self.db.set_last_account(&current) {
            warn!(error = %e, "failed to persist swapped account marker");
        }
        let _ = self.events.send(SessionEvent::AccountSwapped { previous, current });

        if let Err(e) = self.refresh_balance().await {
            warn!(error = %e, "balance refresh after account swap failed");
        }
    }

    async fn handle_chain_changed(self: &Arc<Self>, chain_id: u64) {
        let _ = self.events.send(SessionEvent::ChainChanged { chain_id });
        if !self.state.read().is_connected() {
            return;
        }
        // Chain-dependent derived state (balance, pending sends) cannot be
        // trusted across a silent network swap. The session goes down hard
        // and the embedder re-initializes.
        warn!(chain_id, "wallet changed chains, terminating session");
        self.set_state(ConnectionState::Error {
            message: NETWORK_CHANGED_MESSAGE.to_string(),
        });
    }

    /// Spawns a fire-and-forget reconnect task. Overlapping schedules are
    /// collapsed by the `reconnecting` guard inside `auto_reconnect`.
    fn schedule_reconnect(self: &Arc<Self>) {
        let session = Arc::clone(self);
        self.tasks.lock().push(tokio::spawn(async move {
            match session.auto_reconnect().await {
                Ok(_) => {}
                Err(SessionError::ReconnectInProgress) => {}
                Err(e) => debug!(error = %e, "scheduled reconnect did not recover"),
            }
        }));
    }

    // -- State transitions --------------------------------------------------

    fn set_state(&self, next: ConnectionState) {
        let label = next.label();
        debug!(state = label, "session state transition");
        *self.state.write() = next.clone();
        if let Err(e) = self.db.set_connection_status(label) {
            warn!(error = %e, "failed to persist connection-status marker");
        }
        let _ = self.events.send(SessionEvent::StateChanged { state: next });
    }
}

/// Builds session details from a validation report. The report's balance
/// rides along so connect does not refetch what the probe already read.
fn details_from_report(account: Address, report: &ValidationReport) -> SessionDetails {
    let balance_base = report.balance_base.unwrap_or(0);
    SessionDetails {
        account,
        network_id: report.network_id.unwrap_or(SHARDEUM_CHAIN_ID),
        balance: format_shm(balance_base),
        balance_base,
        latency_ms: report.latency_ms,
        connection_strong: report.connection_strong,
        last_updated: Utc::now(),
    }
}

/// Whether a provider failure smells like a lost connection rather than a
/// bad request. These trigger the reconnect path instead of surfacing.
fn is_connectivity_error(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Unavailable | ProviderError::Transport(_)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
