//! # CLI Interface
//!
//! Defines the command-line argument structure for `paylink-agent` using
//! `clap` derive. Supports five subcommands: `run`, `encode`, `decode`,
//! `status`, and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use paylink_core::config::{DEFAULT_API_PORT, DEFAULT_LINK_TTL_SECS};

/// PayLink session agent.
///
/// A headless wallet-session daemon for the Shardeum testnet. Maintains a
/// validated wallet connection, tracks submitted transactions to
/// settlement, serves the REST/WebSocket API, and mints expiring payment
/// links.
#[derive(Parser, Debug)]
#[command(
    name = "paylink-agent",
    about = "PayLink wallet-session agent",
    version,
    propagate_version = true
)]
pub struct PayLinkCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the agent binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the agent: connect the wallet, serve the API, track sends.
    Run(RunArgs),
    /// Encode a payment link token and print it to stdout.
    Encode(EncodeArgs),
    /// Decode a payment link token and print the payload as JSON.
    Decode(DecodeArgs),
    /// Query the status of a running agent via its API endpoint.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the agent data directory where the session markers and the
    /// transaction ledger are stored.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "PAYLINK_DATA_DIR", default_value = "~/.paylink")]
    pub data_dir: PathBuf,

    /// Port for the REST/WebSocket API (metrics are served on the same
    /// port under /metrics).
    #[arg(long, env = "PAYLINK_PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "PAYLINK_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Wallet account for the built-in simulated wallet (0x-hex address).
    ///
    /// The agent drives a local simulated wallet; this picks its funded
    /// account. A fixed default keeps restarts resumable.
    #[arg(long, env = "PAYLINK_ACCOUNT", default_value = "0x00000000000000000000000000000000000011aa")]
    pub account: String,

    /// Starting balance for the simulated account, in whole SHM.
    #[arg(long, env = "PAYLINK_BALANCE", default_value = "100")]
    pub balance: String,
}

/// Arguments for the `encode` subcommand.
#[derive(Parser, Debug)]
pub struct EncodeArgs {
    /// Receiving account, 0x-hex address.
    #[arg(long, short = 'r')]
    pub recipient: String,

    /// Amount in whole SHM, decimal string.
    #[arg(long, short = 'a')]
    pub amount: String,

    /// Optional free-text message carried in the link.
    #[arg(long, short = 'm')]
    pub message: Option<String>,

    /// Link lifetime in seconds (10-300).
    #[arg(long, default_value_t = DEFAULT_LINK_TTL_SECS)]
    pub ttl: u64,
}

/// Arguments for the `decode` subcommand.
#[derive(Parser, Debug)]
pub struct DecodeArgs {
    /// The payment link token to decode.
    pub token: String,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// API endpoint of the running agent.
    #[arg(long, default_value = "http://127.0.0.1:18083")]
    pub url: String,
}
