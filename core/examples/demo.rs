//! Interactive CLI demo of the full PayLink lifecycle.
//!
//! Walks through wallet connection, payment-link minting and decoding,
//! a tracked transfer settling on-chain, a split payment, and an outage
//! with automatic reconnect. The output uses ANSI escape codes for
//! colored, storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release

use std::sync::Arc;
use std::time::{Duration, Instant};

use paylink_core::link;
use paylink_core::provider::{Address, SimulatedWallet, WalletProvider};
use paylink_core::session::WalletSession;
use paylink_core::store::PayLinkDb;
use paylink_core::tracker::{plan_equal, Direction, RecordStatus, TransactionTracker};
use paylink_core::units::{format_shm, parse_shm};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const ITALIC: &str = "\x1b[3m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    PAYLINK  --  Wallet Session Lifecycle Demo                      {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Version 0.1.0  |  Shardeum Testnet (chain 8083)                 {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!(
        "{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]=============================================================={RESET}"
    );
    println!("{BOLD}{WHITE}  {title}{RESET}");
    println!(
        "{CYAN}------------------------------------------------------------------------{RESET}"
    );
}

fn subsection(text: &str) {
    println!("{DIM}{CYAN}  >> {text}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn balance_row(name: &str, wallet: &SimulatedWallet, account: &Address, color: &str) {
    println!(
        "  {color}{BOLD}{name:<12}{RESET}  {WHITE}{:>14}{RESET} {DIM}SHM{RESET}",
        format_shm(wallet.balance_of(account))
    );
}

fn separator() {
    println!(
        "{DIM}{CYAN}  . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . . {RESET}"
    );
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn addr(raw: &str) -> Address {
    Address::parse(raw).expect("demo address")
}

/// Blocks until a ledger record goes terminal, printing a dot per poll.
async fn watch_settlement(tracker: &Arc<TransactionTracker>, id: Uuid) -> RecordStatus {
    loop {
        if let Some(record) = tracker.get(&id) {
            if record.status.is_terminal() {
                println!();
                return record.status;
            }
        }
        print!("{DIM}.{RESET}");
        use std::io::Write;
        let _ = std::io::stdout().flush();
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let demo_start = Instant::now();

    banner();

    let payer = addr("0x00000000000000000000000000000000000011aa");
    let merchant = addr("0x00000000000000000000000000000000000022bb");
    let courier = addr("0x00000000000000000000000000000000000033cc");

    // -----------------------------------------------------------------------
    // Step 1: Wallet Connection
    // -----------------------------------------------------------------------

    section(1, "Wallet Connection & Validation");
    subsection("Funding a simulated wallet and opening the session...");

    let wallet = Arc::new(SimulatedWallet::with_account(
        payer,
        parse_shm("100").unwrap(),
    ));
    let db = PayLinkDb::open_temporary().expect("temporary database");

    let t = Instant::now();
    let session = WalletSession::new(Arc::clone(&wallet) as Arc<dyn WalletProvider>, db);
    let details = session.connect().await.expect("connect");
    timing("connect + validate", t.elapsed());

    info("Account", &details.account.to_string());
    info("Network", &format!("chain {}", details.network_id));
    info("Balance", &format!("{} SHM", details.balance));
    info(
        "Connection",
        if details.connection_strong {
            "strong"
        } else {
            "weak"
        },
    );
    success("Session connected and validated against the Shardeum testnet");

    let tracker = TransactionTracker::new(Arc::clone(&session)).expect("tracker");

    // -----------------------------------------------------------------------
    // Step 2: Mint a Payment Link
    // -----------------------------------------------------------------------

    section(2, "Payment Link Minting");
    subsection("Encoding an expiring payment request for the merchant...");

    let t = Instant::now();
    let token =
        link::encode(merchant, "12.5", Some("table 7".into()), 120).expect("encode link");
    timing("encode", t.elapsed());

    info("Token", &format!("{}...", &token[..token.len().min(40)]));
    info("Payment page", &link::payment_page_url("", &token));
    info(
        "One-click URI",
        &link::one_click_uri(&merchant, parse_shm("12.5").unwrap(), None),
    );
    success("Link minted; valid for 120 seconds");

    // -----------------------------------------------------------------------
    // Step 3: Decode and Pay the Link
    // -----------------------------------------------------------------------

    section(3, "Decode & Pay");
    subsection("The payer decodes the token and submits the transfer...");

    let decoded = link::decode(&token).expect("decode link");
    info(
        "Link status",
        if decoded.status.is_valid() {
            "valid"
        } else {
            "not payable"
        },
    );
    info("Recipient", &decoded.descriptor.recipient.to_string());
    info("Amount", &format!("{} SHM", decoded.descriptor.amount));
    info(
        "Time remaining",
        &link::format_time_remaining(decoded.descriptor.expiry, chrono::Utc::now()),
    );

    let record = tracker
        .send(
            decoded.descriptor.recipient,
            &decoded.descriptor.amount,
            decoded.descriptor.message.clone(),
        )
        .await
        .expect("send payment");

    info("Record id", &record.id.to_string());
    info(
        "Tx hash",
        &record.hash.map(|h| h.to_string()).unwrap_or_default(),
    );
    subsection("Waiting for the receipt poller...");
    let status = watch_settlement(&tracker, record.id).await;
    assert_eq!(status, RecordStatus::Confirmed);
    success("Payment confirmed on-chain");

    separator();
    println!();
    println!("  {BOLD}{WHITE}--- Balances After Payment ---{RESET}");
    balance_row("Payer", &wallet, &payer, BLUE);
    balance_row("Merchant", &wallet, &merchant, MAGENTA);
    println!();

    // -----------------------------------------------------------------------
    // Step 4: Split Payment
    // -----------------------------------------------------------------------

    section(4, "Split Payment");
    subsection("Splitting 9 SHM equally between merchant and courier...");

    let plan = plan_equal("9", &[merchant, courier]).expect("plan");
    for item in &plan {
        info("Share", &format!("{} -> {} SHM", item.recipient, item.amount_display()));
    }

    let outcome = tracker.send_split(&plan, Some("delivery run")).await;
    assert!(outcome.is_complete());
    subsection("Waiting for both shares to settle...");
    for id in &outcome.successes {
        watch_settlement(&tracker, *id).await;
    }
    success("Both shares confirmed; a failed share would never abort the batch");

    println!();
    println!("  {BOLD}{WHITE}--- Balances After Split ---{RESET}");
    balance_row("Payer", &wallet, &payer, BLUE);
    balance_row("Merchant", &wallet, &merchant, MAGENTA);
    balance_row("Courier", &wallet, &courier, GREEN);
    println!();

    // -----------------------------------------------------------------------
    // Step 5: Outage and Reconnect
    // -----------------------------------------------------------------------

    section(5, "Outage & Automatic Reconnect");
    subsection("Taking the wallet offline and probing the session...");

    wallet.set_offline(true);
    let err = session
        .refresh_balance()
        .await
        .expect_err("offline probe must fail");
    info("Probe result", &err.to_string());
    info("Session state", session.state().label());

    subsection("Wallet restored; waiting for the scheduled reconnect...");
    wallet.set_offline(false);
    let t = Instant::now();
    while !session.state().is_connected() {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    timing("reconnect", t.elapsed());
    success("Session restored without a user prompt");

    // -----------------------------------------------------------------------
    // Step 6: History
    // -----------------------------------------------------------------------

    section(6, "Transaction History");

    let history = tracker.history(Some(Direction::Sent));
    for record in &history {
        println!(
            "  {GREEN}[{}]{RESET} {BOLD}{}{RESET} SHM -> {DIM}{}{RESET}  {ITALIC}{DIM}{}{RESET}",
            record.status,
            record.amount,
            record.to,
            record.message.as_deref().unwrap_or("-"),
        );
    }
    info("Records", &history.len().to_string());
    info("Pending", &tracker.pending_count().to_string());

    // -----------------------------------------------------------------------
    // Final Summary
    // -----------------------------------------------------------------------

    session.disconnect().await.expect("disconnect");
    tracker.shutdown().await;
    session.shutdown().await;

    let total_elapsed = demo_start.elapsed();

    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    DEMO COMPLETE -- Final Summary                                  {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();

    println!("  {BOLD}{WHITE}Session Statistics:{RESET}");
    println!("  {DIM}----------------------------------------------{RESET}");
    info("Payments settled", &history.len().to_string());
    info("Links minted", "1 (120s TTL)");
    info("Outages survived", "1 (bounded reconnect)");
    info("Chain", "Shardeum Testnet (8083)");
    info("Money math", "u128 base units, 18 decimals");
    info("Storage", "sled (temporary)");
    println!();
    println!(
        "  {BOLD}{GREEN}Total demo time: {:.2}s{RESET}",
        total_elapsed.as_secs_f64()
    );
    println!();
}
