//! Error types for the indexer

use rpc_core::{Amount, Hash, Prevout, RpcError};
use thiserror::Error;

/// SQLite result code for "database or disk is full".
const SQLITE_FULL: &str = "13";

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Chain source error: {0}")]
    Source(#[from] RpcError),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Storage full: {0}")]
    StorageFull(String),

    #[error("Height {height} cannot be imported before its predecessor is indexed")]
    MissingPredecessor { height: u64 },

    #[error("Dangling reference: no indexed output {prevout} before height {height}")]
    DanglingReference { prevout: Prevout, height: u64 },

    #[error("Output {prevout} already spent by {spent_by}")]
    AlreadySpent { prevout: Prevout, spent_by: String },

    #[error("Balance of {address} would drop to {balance}")]
    NegativeBalance { address: String, balance: Amount },

    #[error("Chain linkage broken at height {height}: expected previous hash {expected}, got {found}")]
    ChainLinkage {
        height: u64,
        expected: String,
        found: String,
    },

    #[error("Coinbase input in transaction {txid} at position {position}")]
    UnexpectedCoinbase { txid: Hash, position: usize },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Coin mismatch: {coin} expects genesis {expected}, daemon reports {found}")]
    CoinMismatch {
        coin: String,
        expected: Hash,
        found: Hash,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether processing may continue after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Detail for one transaction is lost; the rest of the block proceeds.
    Skippable,
    /// The in-flight height is rolled back and the run halts.
    Fatal,
}

impl IndexerError {
    pub fn severity(&self) -> Severity {
        match self {
            IndexerError::Source(RpcError::TransactionNotFound(_)) => Severity::Skippable,
            _ => Severity::Fatal,
        }
    }

    pub fn is_storage_full(&self) -> bool {
        matches!(self, IndexerError::StorageFull(_))
    }
}

impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() || db_err.is_check_violation() {
                return IndexerError::Integrity(db_err.message().to_string());
            }
            if db_err.code().as_deref() == Some(SQLITE_FULL) {
                return IndexerError::StorageFull(db_err.message().to_string());
            }
        }
        IndexerError::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_transactions_are_skippable() {
        let missing = IndexerError::from(RpcError::TransactionNotFound(Hash::zero()));
        assert_eq!(missing.severity(), Severity::Skippable);

        let down = IndexerError::from(RpcError::SourceUnavailable("refused".into()));
        assert_eq!(down.severity(), Severity::Fatal);

        let dangling = IndexerError::DanglingReference {
            prevout: Prevout { txid: Hash::zero(), vout: 0 },
            height: 1,
        };
        assert_eq!(dangling.severity(), Severity::Fatal);

        let gap = IndexerError::MissingPredecessor { height: 7 };
        assert_eq!(gap.severity(), Severity::Fatal);
        assert_eq!(
            gap.to_string(),
            "Height 7 cannot be imported before its predecessor is indexed"
        );
    }

    #[test]
    fn test_row_not_found_is_plain_database_error() {
        let err = IndexerError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, IndexerError::Database(_)));
        assert!(!err.is_storage_full());
    }
}
