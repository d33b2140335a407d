//! End-to-end integration tests for the PayLink core.
//!
//! These tests exercise whole user journeys rather than single modules:
//! connecting a wallet, minting and decoding a payment link, paying it,
//! watching the transaction settle, surviving a wallet outage, and picking
//! a pending transaction back up after a process restart.
//!
//! Each test stands alone with its own simulated wallet and temporary
//! database. No shared state, no test ordering dependencies, no flaky
//! failures — time-driven paths run under tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use paylink_core::link;
use paylink_core::provider::{Address, SimulatedWallet, WalletProvider};
use paylink_core::session::{ConnectionState, StatusLevel, WalletSession};
use paylink_core::store::PayLinkDb;
use paylink_core::tracker::{plan_equal, Direction, RecordStatus, TransactionTracker};
use paylink_core::units::parse_shm;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const PAYER: &str = "0x00000000000000000000000000000000000011aa";
const MERCHANT: &str = "0x00000000000000000000000000000000000022bb";
const COURIER: &str = "0x00000000000000000000000000000000000033cc";

fn addr(raw: &str) -> Address {
    Address::parse(raw).expect("test address")
}

/// Spins up a funded simulated wallet with a fresh temporary database and
/// connects the session.
async fn connected_stack(
    balance_shm: &str,
) -> (
    Arc<SimulatedWallet>,
    Arc<WalletSession>,
    Arc<TransactionTracker>,
) {
    let wallet = Arc::new(SimulatedWallet::with_account(
        addr(PAYER),
        parse_shm(balance_shm).expect("balance"),
    ));
    let db = PayLinkDb::open_temporary().expect("temp db");
    let session = WalletSession::new(Arc::clone(&wallet) as Arc<dyn WalletProvider>, db);
    session.connect().await.expect("connect");
    let tracker = TransactionTracker::new(Arc::clone(&session)).expect("tracker");
    (wallet, session, tracker)
}

/// Polls the ledger until a record reaches the wanted status.
async fn wait_for_status(tracker: &Arc<TransactionTracker>, id: Uuid, wanted: RecordStatus) {
    for _ in 0..4000 {
        if let Some(record) = tracker.get(&id) {
            if record.status == wanted {
                return;
            }
            assert!(
                !record.status.is_terminal(),
                "record went terminal as {:?} while waiting for {:?}",
                record.status,
                wanted
            );
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    panic!("record {} never reached {:?}", id, wanted);
}

/// Polls the session until its state satisfies the predicate.
async fn wait_for_state(session: &Arc<WalletSession>, pred: impl Fn(&ConnectionState) -> bool) {
    for _ in 0..4000 {
        if pred(&session.state()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!(
        "session never reached the wanted state, last: {:?}",
        session.state()
    );
}

// ---------------------------------------------------------------------------
// Journey: link to settled payment
// ---------------------------------------------------------------------------

/// The flagship flow: a merchant mints a payment link, the payer decodes
/// it, pays it, and the ledger ends with a confirmed sent record.
#[tokio::test(start_paused = true)]
async fn payment_link_journey_settles_on_chain() {
    let (wallet, session, tracker) = connected_stack("10").await;

    // Merchant side: mint an expiring link.
    let token =
        link::encode(addr(MERCHANT), "2.5", Some("invoice #42".into()), 60).expect("encode link");

    // Payer side: decode and verify before paying.
    let decoded = link::decode(&token).expect("decode link");
    assert!(decoded.status.is_valid());
    assert_eq!(decoded.descriptor.recipient, addr(MERCHANT));
    assert_eq!(decoded.descriptor.amount, "2.5");
    assert_eq!(decoded.descriptor.message.as_deref(), Some("invoice #42"));

    // Pay exactly what the link asks for.
    let record = tracker
        .send(
            decoded.descriptor.recipient,
            &decoded.descriptor.amount,
            decoded.descriptor.message.clone(),
        )
        .await
        .expect("send payment");
    assert_eq!(record.status, RecordStatus::Pending);

    wait_for_status(&tracker, record.id, RecordStatus::Confirmed).await;

    // The chain saw the money move.
    assert_eq!(wallet.balance_of(&addr(MERCHANT)), parse_shm("2.5").unwrap());

    // The ledger remembers the payment.
    let sent = tracker.history(Some(Direction::Sent));
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, record.id);
    assert_eq!(sent[0].amount, "2.5");
    assert!(sent[0].hash.is_some());
    assert!(sent[0].confirmed_at.is_some());

    session.disconnect().await.expect("disconnect");
    assert_eq!(session.state(), ConnectionState::Disconnected);

    tracker.shutdown().await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Journey: wallet outage and recovery
// ---------------------------------------------------------------------------

/// A live session survives the wallet dropping offline: the health check
/// notices, the session degrades to an error, and the scheduled reconnect
/// restores it once the wallet is reachable again.
#[tokio::test(start_paused = true)]
async fn outage_degrades_then_reconnect_recovers() {
    let (wallet, session, tracker) = connected_stack("10").await;
    session.spawn_background_tasks();

    wallet.set_offline(true);

    // The periodic health check finds the wallet unreachable.
    wait_for_state(&session, |s| matches!(s, ConnectionState::Error { .. })).await;
    assert_ne!(
        StatusLevel::for_session(&session.state()),
        StatusLevel::Connected
    );

    // Wallet comes back; the reconnect loop lands within its budget.
    wallet.set_offline(false);
    wait_for_state(&session, ConnectionState::is_connected).await;

    // The restored session is fully usable.
    let record = tracker
        .send(addr(MERCHANT), "1", None)
        .await
        .expect("send after recovery");
    wait_for_status(&tracker, record.id, RecordStatus::Confirmed).await;

    tracker.shutdown().await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Journey: split payment
// ---------------------------------------------------------------------------

/// An equal split pays every recipient and records one ledger entry per
/// share.
#[tokio::test(start_paused = true)]
async fn equal_split_pays_all_recipients() {
    let (wallet, session, tracker) = connected_stack("10").await;

    let recipients = [addr(MERCHANT), addr(COURIER)];
    let plan = plan_equal("6", &recipients).expect("plan");
    let outcome = tracker.send_split(&plan, Some("dinner")).await;

    assert!(outcome.is_complete());
    assert_eq!(outcome.successes.len(), 2);

    for id in &outcome.successes {
        wait_for_status(&tracker, *id, RecordStatus::Confirmed).await;
    }

    assert_eq!(wallet.balance_of(&addr(MERCHANT)), parse_shm("3").unwrap());
    assert_eq!(wallet.balance_of(&addr(COURIER)), parse_shm("3").unwrap());
    // Everything above was spent from the payer.
    assert_eq!(wallet.balance_of(&addr(PAYER)), parse_shm("4").unwrap());

    tracker.shutdown().await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Journey: restart with a pending transaction
// ---------------------------------------------------------------------------

/// A transaction submitted before a process restart settles after it: the
/// restarted tracker restores the ledger from disk and resumes polling.
#[tokio::test(start_paused = true)]
async fn pending_transaction_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let wallet = Arc::new(SimulatedWallet::with_account(
        addr(PAYER),
        parse_shm("10").unwrap(),
    ));

    // First process: connect, submit, and die before the receipt lands.
    let record_id = {
        let db = PayLinkDb::open(dir.path()).expect("open db");
        let session = WalletSession::new(Arc::clone(&wallet) as Arc<dyn WalletProvider>, db);
        session.connect().await.expect("connect");
        let tracker = TransactionTracker::new(Arc::clone(&session)).expect("tracker");

        wallet.set_receipt_delay(50);
        let record = tracker.send(addr(MERCHANT), "4", None).await.expect("send");

        tracker.shutdown().await;
        session.shutdown().await;
        record.id
    };

    // Second process over the same data directory.
    let db = PayLinkDb::open(dir.path()).expect("reopen db");
    let session = WalletSession::new(Arc::clone(&wallet) as Arc<dyn WalletProvider>, db);
    let resumed = session.resume().await.expect("resume");
    assert!(
        resumed.is_some(),
        "the account marker should survive a restart"
    );

    let tracker = TransactionTracker::new(Arc::clone(&session)).expect("tracker");
    let restored = tracker.get(&record_id).expect("restored record");
    assert_eq!(restored.status, RecordStatus::Pending);
    assert_eq!(restored.amount, "4");

    tracker.resume_polling();
    wait_for_status(&tracker, record_id, RecordStatus::Confirmed).await;
    assert_eq!(wallet.balance_of(&addr(MERCHANT)), parse_shm("4").unwrap());

    tracker.shutdown().await;
    session.shutdown().await;
}

// ---------------------------------------------------------------------------
// Journey: refused connect, then a clean retry
// ---------------------------------------------------------------------------

/// A user declining the wallet prompt leaves no session residue, and the
/// next attempt starts from a clean slate.
#[tokio::test(start_paused = true)]
async fn rejected_connect_leaves_no_residue() {
    let wallet = Arc::new(SimulatedWallet::with_account(
        addr(PAYER),
        parse_shm("10").unwrap(),
    ));
    let db = PayLinkDb::open_temporary().expect("temp db");
    let session = WalletSession::new(Arc::clone(&wallet) as Arc<dyn WalletProvider>, db);

    wallet.set_reject_connect(true);
    let err = session.connect().await.expect_err("prompt refused");
    assert_eq!(err.to_string(), "User rejected the request.");
    assert!(session.db().last_account().expect("marker read").is_none());

    // The user changes their mind.
    wallet.set_reject_connect(false);
    let details = session.connect().await.expect("second attempt");
    assert_eq!(details.account, addr(PAYER));
    assert!(session.state().is_connected());

    session.shutdown().await;
}
