// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PayLink — Core Library
//!
//! The engine behind PayLink: wallet-session management and shareable
//! payment links for the Shardeum testnet, with none of the browser glued
//! on. Everything a front-end or agent needs — connect, validate, send,
//! track, encode — lives here behind plain async APIs.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the actual concerns of a
//! wallet session:
//!
//! - **provider** — The wallet abstraction: accounts, chains, balances,
//!   transactions. Plus a fully scriptable simulator.
//! - **session** — The connection state machine: validation, health
//!   checks, bounded reconnects, push-event handling.
//! - **tracker** — The transaction ledger: submit, poll, settle, persist.
//! - **link** — Expiring payment-link tokens and the URIs built on them.
//! - **store** — Durable local storage over sled. The session's memory.
//! - **units** — SHM amount parsing and formatting. Exact, base-unit math.
//! - **config** — Chain parameters and timing constants.
//!
//! ## Design Philosophy
//!
//! 1. Money math is integer math. Floats never touch an amount.
//! 2. Terminal states stay terminal. A confirmed transaction never
//!    un-confirms, no matter what a late receipt claims.
//! 3. The provider is a trait. Tests script failures; production talks to
//!    a real wallet. The state machine cannot tell the difference.

pub mod config;
pub mod link;
pub mod provider;
pub mod session;
pub mod store;
pub mod tracker;
pub mod units;
