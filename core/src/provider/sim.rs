//! # Simulated Wallet
//!
//! An in-memory [`WalletProvider`] with deliberate failure injection. This
//! is what the test suite and the agent's local mode run against: it keeps
//! real balances, debits real transfers, and mines receipts on a schedule,
//! but every probe can be made to fail on demand.
//!
//! The knobs model user behavior, not implementation details: a user who
//! rejects the connect prompt, a wallet that drops offline, a transaction
//! that takes eleven polls to mine, an account switch in the wallet UI.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::broadcast;

use super::types::{
    Address, ChainDescriptor, FeeData, ReceiptStatus, TransactionReceipt, TransactionRequest,
    TxHash,
};
use super::{ProviderError, WalletProvider, WalletPushEvent, ERR_USER_REJECTED};
use crate::config::SHARDEUM_CHAIN_ID;
use async_trait::async_trait;

/// Capacity of the push-event channel. Lagging subscribers lose the oldest
/// events, same as a browser tab that was suspended.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default simulated gas price: 25 gwei.
const SIM_GAS_PRICE: u128 = 25_000_000_000;

struct PendingTx {
    from: Address,
    to: Address,
    polls_remaining: u32,
    status: ReceiptStatus,
    block_number: u64,
}

struct SimState {
    accounts: Vec<Address>,
    balances: HashMap<Address, u128>,
    chain_id: u64,
    known_chains: HashSet<u64>,
    block_number: u64,
    pending: HashMap<TxHash, PendingTx>,

    // Failure injection.
    offline: bool,
    reject_connect: bool,
    fail_balance: bool,
    balance_failures_remaining: u32,
    fail_chain_id: bool,
    fail_fee_data: bool,
    fail_block_number: bool,
    fail_receipt_lookup: bool,
    latency: Duration,

    // Receipt scheduling for the next submitted transaction.
    receipt_delay_polls: u32,
    next_receipt_status: ReceiptStatus,
}

/// In-memory wallet with scriptable failures.
pub struct SimulatedWallet {
    inner: Mutex<SimState>,
    events: broadcast::Sender<WalletPushEvent>,
}

impl SimulatedWallet {
    /// Empty wallet on the Shardeum testnet chain. No accounts exposed
    /// until [`add_account`](Self::add_account) is called.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(SimState {
                accounts: Vec::new(),
                balances: HashMap::new(),
                chain_id: SHARDEUM_CHAIN_ID,
                known_chains: [1, SHARDEUM_CHAIN_ID].into_iter().collect(),
                block_number: 1_000_000,
                pending: HashMap::new(),
                offline: false,
                reject_connect: false,
                fail_balance: false,
                balance_failures_remaining: 0,
                fail_chain_id: false,
                fail_fee_data: false,
                fail_block_number: false,
                fail_receipt_lookup: false,
                latency: Duration::ZERO,
                receipt_delay_polls: 0,
                next_receipt_status: ReceiptStatus::Success,
            }),
            events,
        }
    }

    /// Wallet with a single funded account, ready to connect.
    pub fn with_account(account: Address, balance: u128) -> Self {
        let wallet = Self::new();
        wallet.add_account(account, balance);
        wallet
    }

    /// Exposes another account. The first account added is the selected one.
    pub fn add_account(&self, account: Address, balance: u128) {
        let mut s = self.inner.lock();
        s.accounts.push(account);
        s.balances.insert(account, balance);
    }

    /// Overwrites an account balance.
    pub fn set_balance(&self, account: Address, balance: u128) {
        self.inner.lock().balances.insert(account, balance);
    }

    /// Current balance as the simulator sees it. Test assertion helper.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.inner
            .lock()
            .balances
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    /// Moves the wallet to another chain without emitting an event.
    pub fn set_chain(&self, chain_id: u64) {
        let mut s = self.inner.lock();
        s.chain_id = chain_id;
        s.known_chains.insert(chain_id);
    }

    /// Removes a chain from the wallet's known set, so the next switch to
    /// it comes back with code 4902 until an add-chain call registers it.
    pub fn forget_chain(&self, chain_id: u64) {
        self.inner.lock().known_chains.remove(&chain_id);
    }

    /// Drops or restores the transport. Offline makes every call fail.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Makes the connect prompt come back rejected (code 4001).
    pub fn set_reject_connect(&self, reject: bool) {
        self.inner.lock().reject_connect = reject;
    }

    /// Fails every balance read until cleared.
    pub fn set_balance_probe_failing(&self, failing: bool) {
        self.inner.lock().fail_balance = failing;
    }

    /// Fails exactly the next `n` balance reads, then recovers. Exercises
    /// retry loops without leaving the wallet broken.
    pub fn fail_next_balance_fetches(&self, n: u32) {
        self.inner.lock().balance_failures_remaining = n;
    }

    /// Fails every chain-id read until cleared.
    pub fn set_chain_probe_failing(&self, failing: bool) {
        self.inner.lock().fail_chain_id = failing;
    }

    /// Fails every fee-data read until cleared.
    pub fn set_fee_probe_failing(&self, failing: bool) {
        self.inner.lock().fail_fee_data = failing;
    }

    /// Fails every block-number read until cleared.
    pub fn set_block_probe_failing(&self, failing: bool) {
        self.inner.lock().fail_block_number = failing;
    }

    /// Fails every receipt lookup until cleared.
    pub fn set_receipt_lookup_failing(&self, failing: bool) {
        self.inner.lock().fail_receipt_lookup = failing;
    }

    /// Adds artificial latency to block-number reads.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Transactions submitted after this call return `None` from receipt
    /// lookups for the given number of polls before mining.
    pub fn set_receipt_delay(&self, polls: u32) {
        self.inner.lock().receipt_delay_polls = polls;
    }

    /// Execution outcome for subsequently submitted transactions.
    pub fn set_next_receipt_status(&self, status: ReceiptStatus) {
        self.inner.lock().next_receipt_status = status;
    }

    /// Simulates the user switching accounts (or disconnecting, with an
    /// empty list) in the wallet UI.
    pub fn emit_accounts_changed(&self, accounts: Vec<Address>) {
        {
            let mut s = self.inner.lock();
            s.accounts = accounts.clone();
            for account in &accounts {
                s.balances.entry(*account).or_insert(0);
            }
        }
        let _ = self
            .events
            .send(WalletPushEvent::AccountsChanged { accounts });
    }

    /// Simulates the user flipping chains in the wallet UI.
    pub fn emit_chain_changed(&self, chain_id: u64) {
        {
            let mut s = self.inner.lock();
            s.chain_id = chain_id;
            s.known_chains.insert(chain_id);
        }
        let _ = self.events.send(WalletPushEvent::ChainChanged { chain_id });
    }

    fn random_hash() -> TxHash {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        TxHash::from_bytes(bytes)
    }
}

impl Default for SimulatedWallet {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_online(s: &SimState) -> Result<(), ProviderError> {
    if s.offline {
        Err(ProviderError::Transport("simulated outage".to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl WalletProvider for SimulatedWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let s = self.inner.lock();
        ensure_online(&s)?;
        if s.reject_connect {
            return Err(ProviderError::rpc(
                ERR_USER_REJECTED,
                "User rejected the request.",
            ));
        }
        Ok(s.accounts.clone())
    }

    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let s = self.inner.lock();
        ensure_online(&s)?;
        Ok(s.accounts.clone())
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let s = self.inner.lock();
        ensure_online(&s)?;
        if s.fail_chain_id {
            return Err(ProviderError::Transport(
                "simulated chain-id failure".to_string(),
            ));
        }
        Ok(s.chain_id)
    }

    async fn balance(&self, address: &Address) -> Result<u128, ProviderError> {
        let mut s = self.inner.lock();
        ensure_online(&s)?;
        if s.fail_balance {
            return Err(ProviderError::Transport(
                "simulated balance failure".to_string(),
            ));
        }
        if s.balance_failures_remaining > 0 {
            s.balance_failures_remaining -= 1;
            return Err(ProviderError::Transport(
                "simulated transient balance failure".to_string(),
            ));
        }
        Ok(s.balances.get(address).copied().unwrap_or(0))
    }

    async fn fee_data(&self) -> Result<FeeData, ProviderError> {
        let s = self.inner.lock();
        ensure_online(&s)?;
        if s.fail_fee_data {
            return Err(ProviderError::Transport(
                "simulated fee-data failure".to_string(),
            ));
        }
        Ok(FeeData {
            gas_price: Some(SIM_GAS_PRICE),
            max_fee_per_gas: Some(SIM_GAS_PRICE * 2),
            max_priority_fee_per_gas: Some(SIM_GAS_PRICE / 10),
        })
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        // Read state, then sleep outside the lock so probes can overlap.
        let (latency, number) = {
            let mut s = self.inner.lock();
            ensure_online(&s)?;
            if s.fail_block_number {
                return Err(ProviderError::Transport(
                    "simulated block-number failure".to_string(),
                ));
            }
            s.block_number += 1;
            (s.latency, s.block_number)
        };
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }
        Ok(number)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        let mut s = self.inner.lock();
        ensure_online(&s)?;
        if !s.known_chains.contains(&chain_id) {
            return Err(ProviderError::rpc(
                super::ERR_UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID 0x{:x}", chain_id),
            ));
        }
        s.chain_id = chain_id;
        Ok(())
    }

    async fn add_chain(&self, descriptor: &ChainDescriptor) -> Result<(), ProviderError> {
        let chain_id = descriptor
            .chain_id_decimal()
            .map_err(|e| ProviderError::rpc(-32602, format!("invalid chainId: {}", e)))?;
        let mut s = self.inner.lock();
        ensure_online(&s)?;
        s.known_chains.insert(chain_id);
        Ok(())
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TxHash, ProviderError> {
        let mut s = self.inner.lock();
        ensure_online(&s)?;

        let from = match request.from.or_else(|| s.accounts.first().copied()) {
            Some(from) => from,
            None => {
                return Err(ProviderError::rpc(
                    4100,
                    "The requested account has not been authorized by the user.",
                ))
            }
        };

        let available = s.balances.get(&from).copied().unwrap_or(0);
        let remaining = available.checked_sub(request.value).ok_or_else(|| {
            ProviderError::rpc(-32000, "insufficient funds for transfer")
        })?;
        s.balances.insert(from, remaining);
        *s.balances.entry(request.to).or_insert(0) += request.value;

        let hash = Self::random_hash();
        let mined_at = s.block_number + 1;
        let pending = PendingTx {
            from,
            to: request.to,
            polls_remaining: s.receipt_delay_polls,
            status: s.next_receipt_status,
            block_number: mined_at,
        };
        s.pending.insert(hash, pending);
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        let mut s = self.inner.lock();
        ensure_online(&s)?;
        if s.fail_receipt_lookup {
            return Err(ProviderError::Transport(
                "simulated receipt failure".to_string(),
            ));
        }
        let tx = match s.pending.get_mut(hash) {
            // Unknown hashes stay pending forever, like a transaction the
            // network never saw.
            None => return Ok(None),
            Some(tx) => tx,
        };
        if tx.polls_remaining > 0 {
            tx.polls_remaining -= 1;
            return Ok(None);
        }
        Ok(Some(TransactionReceipt {
            tx_hash: *hash,
            status: tx.status,
            block_number: tx.block_number,
            from: tx.from,
            to: Some(tx.to),
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletPushEvent> {
        self.events.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::parse_shm;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[tokio::test]
    async fn connect_exposes_funded_account() {
        let wallet = SimulatedWallet::with_account(addr(0x11), parse_shm("10").unwrap());
        let accounts = wallet.request_accounts().await.unwrap();
        assert_eq!(accounts, vec![addr(0x11)]);
        assert_eq!(
            wallet.balance(&addr(0x11)).await.unwrap(),
            parse_shm("10").unwrap()
        );
        assert_eq!(wallet.chain_id().await.unwrap(), SHARDEUM_CHAIN_ID);
    }

    #[tokio::test]
    async fn rejected_prompt_is_code_4001() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 0);
        wallet.set_reject_connect(true);
        let err = wallet.request_accounts().await.unwrap_err();
        assert!(err.is_user_rejection());
    }

    #[tokio::test]
    async fn offline_fails_every_call() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 0);
        wallet.set_offline(true);
        assert!(wallet.accounts().await.is_err());
        assert!(wallet.chain_id().await.is_err());
        assert!(wallet.balance(&addr(0x11)).await.is_err());
        assert!(wallet.fee_data().await.is_err());
        assert!(wallet.block_number().await.is_err());

        wallet.set_offline(false);
        assert!(wallet.accounts().await.is_ok());
    }

    #[tokio::test]
    async fn transfer_moves_balance_and_mines() {
        let wallet = SimulatedWallet::with_account(addr(0x11), parse_shm("5").unwrap());
        let request = TransactionRequest::transfer(addr(0x22), parse_shm("2").unwrap());
        let hash = wallet.send_transaction(&request).await.unwrap();

        assert_eq!(wallet.balance_of(&addr(0x11)), parse_shm("3").unwrap());
        assert_eq!(wallet.balance_of(&addr(0x22)), parse_shm("2").unwrap());

        let receipt = wallet.transaction_receipt(&hash).await.unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.from, addr(0x11));
        assert_eq!(receipt.to, Some(addr(0x22)));
    }

    #[tokio::test]
    async fn overdraft_is_rejected_with_rpc_error() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 100);
        let request = TransactionRequest::transfer(addr(0x22), 101);
        let err = wallet.send_transaction(&request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rpc { code: -32000, .. }));
        // Nothing moved.
        assert_eq!(wallet.balance_of(&addr(0x11)), 100);
        assert_eq!(wallet.balance_of(&addr(0x22)), 0);
    }

    #[tokio::test]
    async fn receipt_delay_counts_polls() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 1_000);
        wallet.set_receipt_delay(2);
        let request = TransactionRequest::transfer(addr(0x22), 10);
        let hash = wallet.send_transaction(&request).await.unwrap();

        assert!(wallet.transaction_receipt(&hash).await.unwrap().is_none());
        assert!(wallet.transaction_receipt(&hash).await.unwrap().is_none());
        assert!(wallet.transaction_receipt(&hash).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reverted_status_is_scheduled() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 1_000);
        wallet.set_next_receipt_status(ReceiptStatus::Reverted);
        let request = TransactionRequest::transfer(addr(0x22), 10);
        let hash = wallet.send_transaction(&request).await.unwrap();
        let receipt = wallet.transaction_receipt(&hash).await.unwrap().unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Reverted);
    }

    #[tokio::test]
    async fn unknown_hash_stays_pending() {
        let wallet = SimulatedWallet::new();
        let hash = SimulatedWallet::random_hash();
        assert!(wallet.transaction_receipt(&hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transient_balance_failures_recover() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 77);
        wallet.fail_next_balance_fetches(2);
        assert!(wallet.balance(&addr(0x11)).await.is_err());
        assert!(wallet.balance(&addr(0x11)).await.is_err());
        assert_eq!(wallet.balance(&addr(0x11)).await.unwrap(), 77);
    }

    #[tokio::test]
    async fn switch_to_unknown_chain_needs_add() {
        let wallet = SimulatedWallet::new();
        let err = wallet.switch_chain(4242).await.unwrap_err();
        assert!(err.is_unrecognized_chain());

        let mut descriptor = ChainDescriptor::shardeum();
        descriptor.chain_id = "0x1092".to_string(); // 4242
        wallet.add_chain(&descriptor).await.unwrap();
        wallet.switch_chain(4242).await.unwrap();
        assert_eq!(wallet.chain_id().await.unwrap(), 4242);
    }

    #[tokio::test]
    async fn forgotten_chain_rejects_switch_until_added() {
        let wallet = SimulatedWallet::new();
        wallet.set_chain(1);
        wallet.forget_chain(SHARDEUM_CHAIN_ID);

        let err = wallet.switch_chain(SHARDEUM_CHAIN_ID).await.unwrap_err();
        assert!(err.is_unrecognized_chain());

        wallet.add_chain(&ChainDescriptor::shardeum()).await.unwrap();
        wallet.switch_chain(SHARDEUM_CHAIN_ID).await.unwrap();
        assert_eq!(wallet.chain_id().await.unwrap(), SHARDEUM_CHAIN_ID);
    }

    #[tokio::test]
    async fn chain_probe_failure_is_isolated() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 42);
        wallet.set_chain_probe_failing(true);
        assert!(wallet.chain_id().await.is_err());
        // Other reads keep working.
        assert_eq!(wallet.balance(&addr(0x11)).await.unwrap(), 42);
        assert!(wallet.fee_data().await.is_ok());
    }

    #[tokio::test]
    async fn push_events_reach_subscribers() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 0);
        let mut rx = wallet.subscribe();

        wallet.emit_accounts_changed(vec![addr(0x22)]);
        let ev = rx.recv().await.unwrap();
        assert_eq!(
            ev,
            WalletPushEvent::AccountsChanged {
                accounts: vec![addr(0x22)]
            }
        );
        assert_eq!(wallet.accounts().await.unwrap(), vec![addr(0x22)]);

        wallet.emit_chain_changed(1);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev, WalletPushEvent::ChainChanged { chain_id: 1 });
        assert_eq!(wallet.chain_id().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_observable() {
        let wallet = SimulatedWallet::with_account(addr(0x11), 0);
        wallet.set_latency(Duration::from_millis(40));
        let before = tokio::time::Instant::now();
        wallet.block_number().await.unwrap();
        assert!(before.elapsed() >= Duration::from_millis(40));
    }
}
