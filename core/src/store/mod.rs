//! # Storage Module
//!
//! Durable local state: the transaction ledger and the session markers
//! that let a restart pick up where the last run left off. Everything
//! lives in one embedded sled database; see [`db::PayLinkDb`] for the
//! tree layout.

pub mod db;

pub use db::{PayLinkDb, StoreError, StoreResult};
