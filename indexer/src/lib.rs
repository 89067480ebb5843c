//! Ledger indexer
//!
//! Imports blocks from a bitcoin-style chain daemon into a relational
//! ledger: blocks, transactions, inputs, outputs and per-address balances,
//! one atomically committed height at a time.

pub mod cli;
pub mod coin;
pub mod config;
pub mod database;
pub mod error;
pub mod indexer;
pub mod models;
pub mod rpc_client;

pub use coin::CoinProfile;
pub use config::Config;
pub use error::{IndexerError, Result, Severity};
pub use indexer::{ImportReport, IndexerService, SyncState};
