//! Ledger rows as stored in the database

use rpc_core::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockRow {
    pub hash: String,
    pub height: i64,
    pub prevhash: String,
    /// `None` until the following block has been indexed.
    pub nexthash: Option<String>,
    pub version: i64,
    pub merkleroot: String,
    pub time: i64,
    pub bits: String,
    pub nonce: i64,
    pub size: i64,
    pub difficulty: f64,
    pub cumulative_difficulty: f64,
    pub outstanding: i64,
    pub value_out: i64,
    pub transactions: i64,
    pub transaction_fees: i64,
}

impl BlockRow {
    pub fn outstanding(&self) -> Amount {
        Amount::from_sat(self.outstanding)
    }

    pub fn transaction_fees(&self) -> Amount {
        Amount::from_sat(self.transaction_fees)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransactionRow {
    pub txid: String,
    pub block_height: i64,
    pub n: i64,
    /// `None` when the transaction body was not available.
    pub size: Option<i64>,
    pub version: Option<i64>,
    pub locktime: Option<i64>,
    pub total_out: i64,
    pub total_in: i64,
    pub fee: i64,
}

impl TransactionRow {
    pub fn has_details(&self) -> bool {
        self.size.is_some()
    }

    pub fn fee(&self) -> Amount {
        Amount::from_sat(self.fee)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CoinbaseInputRow {
    pub block_height: i64,
    pub txid: String,
    pub scriptsig: String,
    pub sequence: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InputRow {
    pub block_height: i64,
    pub txid: String,
    pub n: i64,
    pub scriptsig: String,
    pub sequence: i64,
    pub prevout_hash: String,
    pub prevout_n: i64,
    pub address: Option<String>,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutputRow {
    pub block_height: i64,
    pub txid: String,
    pub n: i64,
    pub value: i64,
    pub scriptpubkey: String,
    pub script_type: String,
    /// `None` for data carriers and undecodable scripts.
    pub address: Option<String>,
    pub spent: bool,
    pub linked_txid: Option<String>,
    pub linked_n: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AddressSummaryRow {
    pub address: String,
    pub balance: i64,
    pub received: i64,
    pub sent: i64,
    pub transactions_in: i64,
    pub transactions_out: i64,
}

impl AddressSummaryRow {
    pub fn balance(&self) -> Amount {
        Amount::from_sat(self.balance)
    }
}

/// Which way value moved for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AddressEventRow {
    pub address: String,
    pub amount: i64,
    pub n: i64,
    pub in_block: i64,
    pub txid: String,
    pub direction: String,
}

impl AddressEventRow {
    /// Amount with the sign of its effect on the balance.
    pub fn signed_amount(&self) -> Amount {
        if self.direction == Direction::Outbound.as_str() {
            -Amount::from_sat(self.amount)
        } else {
            Amount::from_sat(self.amount)
        }
    }
}

/// Row counts of every ledger table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub blocks: i64,
    pub txs: i64,
    pub coinbase_txin: i64,
    pub txin: i64,
    pub txout: i64,
    pub addresses: i64,
    pub address_summary: i64,
}

/// Blocks from `height` up to and including the tip.
pub fn confirmations(height: u64, tip: u64) -> u64 {
    (tip + 1).saturating_sub(height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmations() {
        assert_eq!(confirmations(100, 100), 1);
        assert_eq!(confirmations(90, 100), 11);
        assert_eq!(confirmations(0, 0), 1);
        assert_eq!(confirmations(101, 100), 0);
    }

    #[test]
    fn test_signed_event_amount() {
        let mut event = AddressEventRow {
            address: "a".into(),
            amount: 500,
            n: 0,
            in_block: 1,
            txid: "t".into(),
            direction: Direction::Inbound.as_str().into(),
        };
        assert_eq!(event.signed_amount(), Amount::from_sat(500));
        event.direction = Direction::Outbound.as_str().into();
        assert_eq!(event.signed_amount(), Amount::from_sat(-500));
    }
}
