// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PayLink Agent
//!
//! Entry point for the `paylink-agent` binary. Parses CLI arguments,
//! initializes logging and metrics, establishes the wallet session, and
//! serves the HTTP/WS API.
//!
//! The binary supports five subcommands:
//!
//! - `run`     — start the agent daemon
//! - `encode`  — encode a payment link token
//! - `decode`  — decode a payment link token
//! - `status`  — query a running agent's status endpoint
//! - `version` — print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

use paylink_core::config;
use paylink_core::link;
use paylink_core::provider::{Address, SimulatedWallet, WalletProvider};
use paylink_core::session::{SessionEvent, WalletSession};
use paylink_core::store::PayLinkDb;
use paylink_core::tracker::{TrackerEvent, TransactionTracker};
use paylink_core::units::parse_shm;

use cli::{Commands, PayLinkCli};
use logging::LogFormat;
use metrics::{AgentMetrics, SharedMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = PayLinkCli::parse();

    match cli.command {
        Commands::Run(args) => run_agent(args).await,
        Commands::Encode(args) => encode_link(args),
        Commands::Decode(args) => decode_link(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full agent: wallet session, transaction tracker, and the
/// REST/WebSocket API with metrics on the same port.
async fn run_agent(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "paylink_agent=info,paylink_core=info,tower_http=debug",
        LogFormat::from_str_lossy(&args.log_format),
    );

    let data_dir = expand_home(&args.data_dir);
    tracing::info!(
        port = args.port,
        data_dir = %data_dir.display(),
        "starting paylink-agent"
    );

    // --- Persistent storage ---
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = PayLinkDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), records = db.record_count(), "database opened");

    // --- Wallet provider ---
    let account = Address::parse(&args.account)
        .map_err(|e| anyhow::anyhow!("invalid --account address: {}", e))?;
    let balance = parse_shm(&args.balance)
        .map_err(|e| anyhow::anyhow!("invalid --balance amount: {}", e))?;
    let wallet = Arc::new(SimulatedWallet::with_account(account, balance));

    // --- Session + tracker ---
    let session = WalletSession::new(
        Arc::clone(&wallet) as Arc<dyn WalletProvider>,
        db.clone(),
    );
    session.spawn_background_tasks();

    match session.resume().await {
        Ok(Some(details)) => {
            tracing::info!(account = %details.account, "previous session resumed");
        }
        Ok(None) => tracing::info!("no previous session to resume"),
        Err(e) => tracing::warn!("session resume failed: {}", e),
    }

    let tracker = TransactionTracker::new(Arc::clone(&session))
        .context("failed to restore the transaction ledger")?;
    tracker.resume_polling();

    // --- Metrics ---
    let agent_metrics: SharedMetrics = Arc::new(AgentMetrics::new());
    if session.state().is_connected() {
        agent_metrics.session_connected.set(1);
    }
    let event_pump = tokio::spawn(metrics_event_pump(
        Arc::clone(&session),
        Arc::clone(&tracker),
        Arc::clone(&agent_metrics),
    ));

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (chain {})",
            env!("CARGO_PKG_VERSION"),
            config::SHARDEUM_CHAIN_ID,
        ),
        session: Arc::clone(&session),
        tracker: Arc::clone(&tracker),
        metrics: Arc::clone(&agent_metrics),
        started_at: chrono::Utc::now(),
    };

    // --- API server ---
    let router = api::create_router(app_state);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", addr))?;
    tracing::info!("API server listening on {}", addr);

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    event_pump.abort();
    tracker.shutdown().await;
    session.shutdown().await;
    if let Err(e) = db.flush() {
        tracing::warn!("final database flush failed: {}", e);
    }
    tracing::info!("paylink-agent stopped");
    Ok(())
}

/// Mirrors session and tracker events into the Prometheus metrics.
///
/// Lagging is acceptable here; counters under-counting a burst beats
/// blocking the broadcast channel.
async fn metrics_event_pump(
    session: Arc<WalletSession>,
    tracker: Arc<TransactionTracker>,
    metrics: SharedMetrics,
) {
    let mut session_rx = session.subscribe();
    let mut tracker_rx = tracker.subscribe();

    loop {
        tokio::select! {
            event = session_rx.recv() => match event {
                Ok(SessionEvent::StateChanged { state }) => {
                    metrics.session_connected.set(state.is_connected() as i64);
                }
                Ok(SessionEvent::ReconnectScheduled { .. }) => {
                    metrics.reconnect_attempts_total.inc();
                }
                // A silent network swap kills the session; re-establish it
                // from the stored marker, the daemon analog of a page
                // reload.
                Ok(SessionEvent::ChainChanged { chain_id }) => {
                    tracing::warn!(chain_id, "wallet changed networks, re-initializing session");
                    let session = Arc::clone(&session);
                    tokio::spawn(async move {
                        if let Err(e) = session.resume().await {
                            tracing::warn!("re-init after network change failed: {}", e);
                        }
                    });
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            event = tracker_rx.recv() => match event {
                Ok(TrackerEvent::Confirmed { .. }) => {
                    metrics.transactions_confirmed_total.inc();
                }
                Ok(TrackerEvent::Failed { .. }) | Ok(TrackerEvent::TimedOut { .. }) => {
                    metrics.transactions_failed_total.inc();
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Encodes a payment link and prints the token plus derived URIs.
fn encode_link(args: cli::EncodeArgs) -> Result<()> {
    let recipient = Address::parse(&args.recipient)
        .map_err(|e| anyhow::anyhow!("invalid recipient address: {}", e))?;
    let token = link::encode(recipient, &args.amount, args.message, args.ttl)?;
    let base_units = parse_shm(&args.amount)
        .map_err(|e| anyhow::anyhow!("invalid amount: {}", e))?;

    println!("{}", token);
    eprintln!("  payment path : {}", link::payment_page_url("", &token));
    eprintln!("  one-click    : {}", link::one_click_uri(&recipient, base_units, None));
    eprintln!("  expires in   : {}s", args.ttl);
    Ok(())
}

/// Decodes a payment link token and prints the payload as JSON.
fn decode_link(args: cli::DecodeArgs) -> Result<()> {
    let decoded = link::decode(&args.token)?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    if let Some(reason) = decoded.status.reason() {
        eprintln!("warning: {}", reason);
    }
    Ok(())
}

/// Queries a running agent's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP GET without pulling in `reqwest` as a dependency.
/// In a real deployment, swap this for a proper HTTP client.
async fn http_get(url: &str) -> Result<String> {
    let parsed: url::Url = url
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid URL: {}", e))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("missing host in URL"))?;
    let port = parsed.port().unwrap_or(80);
    let path = parsed.path();

    let addr = format!("{}:{}", host, port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Strip HTTP headers — everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());

    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("paylink-agent {}", env!("CARGO_PKG_VERSION"));
    println!(
        "chain         {} ({})",
        config::SHARDEUM_CHAIN_ID,
        config::SHARDEUM_CHAIN_NAME
    );
    println!("rustc         {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Expands a leading `~/` to the user's home directory.
fn expand_home(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Minimal URL parser — just enough to extract host/port/path.
/// Avoids pulling in the `url` crate for a single use.
mod url {
    pub struct Url {
        host: String,
        port: Option<u16>,
        path: String,
    }

    impl Url {
        pub fn host_str(&self) -> Option<&str> {
            Some(&self.host)
        }

        pub fn port(&self) -> Option<u16> {
            self.port
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl std::str::FromStr for Url {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            // Strip scheme.
            let rest = s
                .strip_prefix("http://")
                .or_else(|| s.strip_prefix("https://"))
                .unwrap_or(s);

            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, "/"),
            };

            let (host, port) = match authority.rfind(':') {
                Some(i) => {
                    let p = authority[i + 1..]
                        .parse::<u16>()
                        .map_err(|e| format!("bad port: {}", e))?;
                    (authority[..i].to_string(), Some(p))
                }
                None => (authority.to_string(), None),
            };

            Ok(Url {
                host,
                port,
                path: path.to_string(),
            })
        }
    }
}
