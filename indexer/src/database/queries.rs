//! Read queries over committed ledger state

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::*;

const BLOCK_COLUMNS: &str = "hash, height, prevhash, nexthash, version, merkleroot, time, bits, \
     nonce, size, difficulty, cumulative_difficulty, outstanding, value_out, transactions, \
     transaction_fees";

pub struct BlockQueries;

impl BlockQueries {
    /// Highest committed block, the resume marker.
    pub async fn last(pool: &SqlitePool) -> Result<Option<BlockRow>> {
        let block = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY height DESC LIMIT 1"
        ))
        .fetch_optional(pool)
        .await?;

        Ok(block)
    }

    pub async fn get_by_height(pool: &SqlitePool, height: i64) -> Result<Option<BlockRow>> {
        let block = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE height = ?"
        ))
        .bind(height)
        .fetch_optional(pool)
        .await?;

        Ok(block)
    }

    pub async fn get_by_hash(pool: &SqlitePool, hash: &str) -> Result<Option<BlockRow>> {
        let block = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE hash = ?"
        ))
        .bind(hash)
        .fetch_optional(pool)
        .await?;

        Ok(block)
    }

    /// Every block in height order.
    pub async fn chain(pool: &SqlitePool) -> Result<Vec<BlockRow>> {
        let blocks = sqlx::query_as::<_, BlockRow>(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY height ASC"
        ))
        .fetch_all(pool)
        .await?;

        Ok(blocks)
    }
}

pub struct TransactionQueries;

impl TransactionQueries {
    pub async fn by_block(pool: &SqlitePool, height: i64) -> Result<Vec<TransactionRow>> {
        let txs = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT txid, block_height, n, size, version, locktime, total_out, total_in, fee
            FROM txs
            WHERE block_height = ?
            ORDER BY n
            "#,
        )
        .bind(height)
        .fetch_all(pool)
        .await?;

        Ok(txs)
    }

    pub async fn get(pool: &SqlitePool, txid: &str) -> Result<Option<TransactionRow>> {
        let tx = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT txid, block_height, n, size, version, locktime, total_out, total_in, fee
            FROM txs
            WHERE txid = ?
            ORDER BY block_height DESC
            LIMIT 1
            "#,
        )
        .bind(txid)
        .fetch_optional(pool)
        .await?;

        Ok(tx)
    }

    pub async fn coinbase_input(pool: &SqlitePool, height: i64) -> Result<Option<CoinbaseInputRow>> {
        let input = sqlx::query_as::<_, CoinbaseInputRow>(
            "SELECT block_height, txid, scriptsig, sequence FROM coinbase_txin WHERE block_height = ?",
        )
        .bind(height)
        .fetch_optional(pool)
        .await?;

        Ok(input)
    }
}

pub struct OutputQueries;

impl OutputQueries {
    pub async fn by_tx(pool: &SqlitePool, txid: &str) -> Result<Vec<OutputRow>> {
        let outputs = sqlx::query_as::<_, OutputRow>(
            r#"
            SELECT block_height, txid, n, value, scriptpubkey, script_type, address,
                   spent, linked_txid, linked_n
            FROM txout
            WHERE txid = ?
            ORDER BY n
            "#,
        )
        .bind(txid)
        .fetch_all(pool)
        .await?;

        Ok(outputs)
    }

    pub async fn spent(pool: &SqlitePool) -> Result<Vec<OutputRow>> {
        let outputs = sqlx::query_as::<_, OutputRow>(
            r#"
            SELECT block_height, txid, n, value, scriptpubkey, script_type, address,
                   spent, linked_txid, linked_n
            FROM txout
            WHERE spent = 1
            ORDER BY block_height, txid, n
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(outputs)
    }

    /// Outputs without a decodable destination.
    pub async fn unattributed(pool: &SqlitePool) -> Result<Vec<OutputRow>> {
        let outputs = sqlx::query_as::<_, OutputRow>(
            r#"
            SELECT block_height, txid, n, value, scriptpubkey, script_type, address,
                   spent, linked_txid, linked_n
            FROM txout
            WHERE address IS NULL
            ORDER BY block_height, txid, n
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(outputs)
    }

    /// Sum of the unspent outputs paying `address`.
    pub async fn unspent_total(pool: &SqlitePool, address: &str) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(value), 0) FROM txout WHERE address = ? AND spent = 0",
        )
        .bind(address)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }
}

pub struct InputQueries;

impl InputQueries {
    /// Inputs spending the given output.
    pub async fn spending(pool: &SqlitePool, txid: &str, n: i64) -> Result<Vec<InputRow>> {
        let inputs = sqlx::query_as::<_, InputRow>(
            r#"
            SELECT block_height, txid, n, scriptsig, sequence, prevout_hash, prevout_n,
                   address, value
            FROM txin
            WHERE prevout_hash = ? AND prevout_n = ?
            "#,
        )
        .bind(txid)
        .bind(n)
        .fetch_all(pool)
        .await?;

        Ok(inputs)
    }
}

pub struct AddressQueries;

impl AddressQueries {
    pub async fn get_summary(pool: &SqlitePool, address: &str) -> Result<Option<AddressSummaryRow>> {
        let summary = sqlx::query_as::<_, AddressSummaryRow>(
            r#"
            SELECT address, balance, received, sent, transactions_in, transactions_out
            FROM address_summary
            WHERE address = ?
            "#,
        )
        .bind(address)
        .fetch_optional(pool)
        .await?;

        Ok(summary)
    }

    pub async fn all_summaries(pool: &SqlitePool) -> Result<Vec<AddressSummaryRow>> {
        let summaries = sqlx::query_as::<_, AddressSummaryRow>(
            r#"
            SELECT address, balance, received, sent, transactions_in, transactions_out
            FROM address_summary
            ORDER BY address
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(summaries)
    }

    /// Balance-affecting events for `address`, oldest first.
    pub async fn events(pool: &SqlitePool, address: &str) -> Result<Vec<AddressEventRow>> {
        let events = sqlx::query_as::<_, AddressEventRow>(
            r#"
            SELECT address, amount, n, in_block, txid, direction
            FROM addresses
            WHERE address = ?
            ORDER BY id
            "#,
        )
        .bind(address)
        .fetch_all(pool)
        .await?;

        Ok(events)
    }
}

pub struct LedgerQueries;

impl LedgerQueries {
    pub async fn table_counts(pool: &SqlitePool) -> Result<TableCounts> {
        let (blocks, txs, coinbase_txin, txin, txout, addresses, address_summary) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM blocks),
                    (SELECT COUNT(*) FROM txs),
                    (SELECT COUNT(*) FROM coinbase_txin),
                    (SELECT COUNT(*) FROM txin),
                    (SELECT COUNT(*) FROM txout),
                    (SELECT COUNT(*) FROM addresses),
                    (SELECT COUNT(*) FROM address_summary)
                "#,
            )
            .fetch_one(pool)
            .await?;

        Ok(TableCounts {
            blocks,
            txs,
            coinbase_txin,
            txin,
            txout,
            addresses,
            address_summary,
        })
    }
}
