//! Block import pipeline

pub mod aggregate_tracker;
pub mod balance_ledger;
pub mod block_processor;
pub mod service;
pub mod utxo_resolver;

pub use aggregate_tracker::{AggregateTracker, RunningTotals};
pub use balance_ledger::BalanceLedger;
pub use block_processor::{BlockProcessor, ProcessedBlock};
pub use service::{ImportReport, IndexerService, SyncState};
pub use utxo_resolver::UtxoResolver;
