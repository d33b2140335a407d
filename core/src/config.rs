//! # PayLink Configuration & Constants
//!
//! Every magic number in PayLink lives here. If you're hardcoding a chain id
//! or a poll interval somewhere else, you're doing it wrong and you owe the
//! team coffee.
//!
//! The chain parameters mirror what the Shardeum testnet actually serves.
//! The timing parameters are tuned for a wallet session that should feel
//! responsive without hammering a testnet RPC endpoint.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Chain Parameters
// ---------------------------------------------------------------------------

/// Shardeum testnet chain id, decimal form.
pub const SHARDEUM_CHAIN_ID: u64 = 8083;

/// Shardeum testnet chain id as the wallet APIs expect it: 0x1F93.
pub const SHARDEUM_CHAIN_ID_HEX: &str = "0x1F93";

/// Human-readable chain name, shown by wallets in the add-network prompt.
pub const SHARDEUM_CHAIN_NAME: &str = "Shardeum Testnet";

/// Native currency name and ticker. Shardeum uses the same string for both.
pub const NATIVE_CURRENCY_NAME: &str = "SHM";

/// Native currency ticker symbol.
pub const NATIVE_SYMBOL: &str = "SHM";

/// Native currency decimals. 18, like every EVM chain that values its sanity.
pub const NATIVE_DECIMALS: u8 = 18;

/// Public JSON-RPC endpoint for the testnet.
pub const SHARDEUM_RPC_URL: &str = "https://api-testnet.shardeum.org/";

/// Block explorer base URL. Transaction pages live under `/tx/<hash>`.
pub const SHARDEUM_EXPLORER_URL: &str = "https://explorer-testnet.shardeum.org";

// ---------------------------------------------------------------------------
// Session Timing
// ---------------------------------------------------------------------------

/// How often a connected session re-validates itself against the provider.
pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed delay between auto-reconnect attempts. Deliberately not exponential:
/// a wallet that has been gone for 15 seconds is gone, and five quick tries
/// tell us that just as well as five slow ones.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Auto-reconnect attempt budget. After this many failures the session parks
/// itself in `Error` until someone calls connect() by hand.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Balance fetches retry this many times before giving up.
pub const BALANCE_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between balance retries. Attempt `n` waits `n` times this.
pub const BALANCE_RETRY_STEP: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Receipt Polling
// ---------------------------------------------------------------------------

/// Interval between receipt queries for a pending transaction.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Receipt poll attempt ceiling. 60 attempts at 5 s apiece = 5 minutes of
/// patience, after which the record goes terminal (`timeout` or `error`).
pub const MAX_RECEIPT_POLLS: u32 = 60;

// ---------------------------------------------------------------------------
// Payment Links
// ---------------------------------------------------------------------------

/// Absolute age ceiling for a decoded payment link, in milliseconds.
/// Applies regardless of the TTL baked into the token, so a forged
/// long-lived token still dies after one minute.
pub const LINK_MAX_AGE_MS: i64 = 60_000;

/// Smallest TTL an encoder will accept, in seconds.
pub const LINK_TTL_MIN_SECS: u64 = 10;

/// Largest TTL an encoder will accept, in seconds.
pub const LINK_TTL_MAX_SECS: u64 = 300;

/// Default TTL when the caller doesn't care, in seconds.
pub const DEFAULT_LINK_TTL_SECS: u64 = 30;

/// Ceiling on a single payment amount, in whole SHM. Not a protocol rule —
/// a fat-finger guard inherited from the front-end validation.
pub const MAX_PAYMENT_AMOUNT_SHM: f64 = 1_000_000.0;

// ---------------------------------------------------------------------------
// Agent Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port for the agent. Chain id plus ten thousand, so
/// nobody has to memorize a second number.
pub const DEFAULT_API_PORT: u16 = 18083;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Formats a chain id the way wallet RPC methods want it: 0x-prefixed,
/// uppercase hex, no leading zeros.
pub fn chain_id_hex(chain_id: u64) -> String {
    format!("0x{:X}", chain_id)
}

/// Explorer URL for a transaction hash.
pub fn explorer_tx_url(tx_hash: &str) -> String {
    format!("{}/tx/{}", SHARDEUM_EXPLORER_URL, tx_hash)
}

/// Explorer URL for an account address.
pub fn explorer_address_url(address: &str) -> String {
    format!("{}/address/{}", SHARDEUM_EXPLORER_URL, address)
}
