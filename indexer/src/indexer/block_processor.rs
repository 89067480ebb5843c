//! Turns one daemon block into ledger rows

use std::sync::Arc;

use rpc_core::{Amount, ChainSource, Hash, RawBlock, RawTx, TxIn, TxOut};
use tracing::{debug, warn};

use crate::coin::CoinProfile;
use crate::database::UnitOfWork;
use crate::error::{IndexerError, Result, Severity};
use crate::indexer::aggregate_tracker::{AggregateTracker, RunningTotals};
use crate::indexer::balance_ledger::{BalanceLedger, EventSource};
use crate::indexer::utxo_resolver::UtxoResolver;

/// Summary of a block written into a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedBlock {
    pub height: u64,
    pub hash: Hash,
    pub totals: RunningTotals,
    pub issuance: Amount,
    pub transaction_fees: Amount,
    pub value_out: Amount,
    pub transactions: usize,
    /// Transactions recorded without details because the daemon could not
    /// produce them.
    pub skipped: usize,
}

/// Per-transaction amounts folded into the block row.
#[derive(Debug, Default)]
struct TxTotals {
    total_in: Amount,
    total_out: Amount,
    fee: Amount,
    issuance: Amount,
}

pub struct BlockProcessor {
    source: Arc<dyn ChainSource>,
    profile: CoinProfile,
}

impl BlockProcessor {
    pub fn new(source: Arc<dyn ChainSource>, profile: CoinProfile) -> Self {
        Self { source, profile }
    }

    pub fn profile(&self) -> &CoinProfile {
        &self.profile
    }

    /// Writes the block at `height` and everything in it through `uow`.
    ///
    /// `totals` are the running totals of the block below. The last block of
    /// a batch is stored without a next-hash; its successor fills it in.
    pub async fn process(
        &self,
        uow: &mut UnitOfWork,
        height: u64,
        totals: RunningTotals,
        last_in_batch: bool,
    ) -> Result<ProcessedBlock> {
        let already_indexed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocks WHERE height = ?")
            .bind(height as i64)
            .fetch_one(uow.conn())
            .await?;
        if already_indexed > 0 {
            return Err(IndexerError::Integrity(format!(
                "block at height {height} is already indexed"
            )));
        }

        let hash = self.source.hash_at(height).await?;
        let block = self.source.block(&hash).await?;
        if block.height != height || block.hash != hash {
            return Err(IndexerError::Integrity(format!(
                "daemon returned block {} at height {} for {hash} at height {height}",
                block.hash, block.height
            )));
        }

        let prevhash = if height == 0 {
            self.profile.genesis_prev_hash.clone()
        } else {
            let prevhash = block.previous_block_hash.clone().ok_or_else(|| {
                IndexerError::ChainLinkage {
                    height,
                    expected: "a previous block hash".to_string(),
                    found: "none".to_string(),
                }
            })?;
            AggregateTracker::link_predecessor(uow, height, &block.hash, &prevhash).await?;
            prevhash
        };

        let mut issuance = Amount::ZERO;
        let mut fees = Amount::ZERO;
        let mut value_out = Amount::ZERO;
        let mut skipped = 0;

        for (n, txid) in block.tx.iter().enumerate() {
            if self.profile.is_empty_transaction(txid) {
                debug!("Recording empty transaction {txid} at height {height}");
                insert_placeholder(uow, txid, height, n).await?;
                continue;
            }

            let tx = match self.source.raw_tx(txid).await {
                Ok(tx) => tx,
                Err(e) => {
                    let err = IndexerError::from(e);
                    if err.severity() != Severity::Skippable {
                        return Err(err);
                    }
                    warn!("Skipping details of {txid} at height {height}: {err}");
                    insert_placeholder(uow, txid, height, n).await?;
                    skipped += 1;
                    continue;
                }
            };

            let tx_totals = self.process_transaction(uow, &tx, height, n).await?;
            issuance += tx_totals.issuance;
            fees += tx_totals.fee;
            value_out += tx_totals.total_out;
        }

        let totals = totals.advance(block.difficulty, issuance, fees);
        let nexthash = if last_in_batch {
            None
        } else {
            block.next_block_hash.clone()
        };

        insert_block(uow, &block, &prevhash, nexthash.as_ref(), totals, value_out, fees).await?;

        Ok(ProcessedBlock {
            height,
            hash: block.hash,
            totals,
            issuance,
            transaction_fees: fees,
            value_out,
            transactions: block.tx.len(),
            skipped,
        })
    }

    async fn process_transaction(
        &self,
        uow: &mut UnitOfWork,
        tx: &RawTx,
        height: u64,
        n: usize,
    ) -> Result<TxTotals> {
        let mut totals = TxTotals {
            total_out: tx.total_out(),
            ..TxTotals::default()
        };

        if n == 0 {
            totals.issuance = coinbase_issuance(&tx.vout);
        }

        for output in &tx.vout {
            insert_output(uow, &tx.txid, height, output).await?;
            if let Some(address) = output.script_pub_key.destination() {
                let source = EventSource { txid: &tx.txid, n: output.n, height };
                BalanceLedger::credit(uow, address, output.value, source).await?;
            }
        }

        let mut is_coinbase = false;
        for (i, input) in tx.vin.iter().enumerate() {
            match input {
                TxIn::Coinbase { coinbase, sequence } => {
                    if n != 0 || i != 0 {
                        return Err(IndexerError::UnexpectedCoinbase {
                            txid: tx.txid.clone(),
                            position: n,
                        });
                    }
                    is_coinbase = true;
                    sqlx::query(
                        "INSERT INTO coinbase_txin (block_height, txid, scriptsig, sequence) VALUES (?, ?, ?, ?)",
                    )
                    .bind(height as i64)
                    .bind(tx.txid.as_str())
                    .bind(coinbase)
                    .bind(*sequence as i64)
                    .execute(uow.conn())
                    .await?;
                }
                TxIn::Spend {
                    prevout,
                    script_sig,
                    sequence,
                } => {
                    let input_n = i as u32;
                    let resolved =
                        UtxoResolver::resolve(uow, prevout, &tx.txid, input_n, height).await?;

                    sqlx::query(
                        r#"
                        INSERT INTO txin (
                            block_height, txid, n, scriptsig, sequence,
                            prevout_hash, prevout_n, address, value
                        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(height as i64)
                    .bind(tx.txid.as_str())
                    .bind(i64::from(input_n))
                    .bind(&script_sig.asm)
                    .bind(*sequence as i64)
                    .bind(prevout.txid.as_str())
                    .bind(i64::from(prevout.vout))
                    .bind(resolved.address.as_deref())
                    .bind(resolved.value.to_sat())
                    .execute(uow.conn())
                    .await?;

                    if let Some(address) = &resolved.address {
                        let source = EventSource { txid: &tx.txid, n: input_n, height };
                        BalanceLedger::debit(uow, address, resolved.value, source).await?;
                    }
                    totals.total_in += resolved.value;
                }
            }
        }

        if !is_coinbase {
            totals.fee = totals.total_in - totals.total_out;
            if totals.fee.is_negative() {
                return Err(IndexerError::Integrity(format!(
                    "transaction {} spends {} but creates {}",
                    tx.txid, totals.total_in, totals.total_out
                )));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO txs (
                txid, block_height, n, size, version, locktime, total_out, total_in, fee
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tx.txid.as_str())
        .bind(height as i64)
        .bind(n as i64)
        .bind(tx.size as i64)
        .bind(tx.version)
        .bind(tx.locktime as i64)
        .bind(totals.total_out.to_sat())
        .bind(totals.total_in.to_sat())
        .bind(totals.fee.to_sat())
        .execute(uow.conn())
        .await?;

        Ok(totals)
    }
}

/// Value newly issued by a block's first transaction: its first output that
/// carries value and is not a data carrier.
pub fn coinbase_issuance(outputs: &[TxOut]) -> Amount {
    outputs
        .iter()
        .find(|out| out.value > Amount::ZERO && !out.script_pub_key.is_nulldata())
        .map(|out| out.value)
        .unwrap_or(Amount::ZERO)
}

/// A transaction known only by id: present in the block, worth nothing here.
async fn insert_placeholder(uow: &mut UnitOfWork, txid: &Hash, height: u64, n: usize) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO txs (txid, block_height, n, total_out, total_in, fee)
        VALUES (?, ?, ?, 0, 0, 0)
        "#,
    )
    .bind(txid.as_str())
    .bind(height as i64)
    .bind(n as i64)
    .execute(uow.conn())
    .await?;

    Ok(())
}

async fn insert_output(uow: &mut UnitOfWork, txid: &Hash, height: u64, output: &TxOut) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO txout (
            block_height, txid, n, value, scriptpubkey, script_type, address
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(height as i64)
    .bind(txid.as_str())
    .bind(i64::from(output.n))
    .bind(output.value.to_sat())
    .bind(&output.script_pub_key.asm)
    .bind(&output.script_pub_key.kind)
    .bind(output.script_pub_key.destination())
    .execute(uow.conn())
    .await?;

    Ok(())
}

async fn insert_block(
    uow: &mut UnitOfWork,
    block: &RawBlock,
    prevhash: &Hash,
    nexthash: Option<&Hash>,
    totals: RunningTotals,
    value_out: Amount,
    fees: Amount,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO blocks (
            hash, height, prevhash, nexthash, version, merkleroot, time, bits, nonce,
            size, difficulty, cumulative_difficulty, outstanding, value_out,
            transactions, transaction_fees
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(block.hash.as_str())
    .bind(block.height as i64)
    .bind(prevhash.as_str())
    .bind(nexthash.map(Hash::as_str))
    .bind(block.version)
    .bind(block.merkle_root.as_str())
    .bind(block.time)
    .bind(&block.bits)
    .bind(block.nonce as i64)
    .bind(block.size as i64)
    .bind(block.difficulty)
    .bind(totals.cumulative_difficulty)
    .bind(totals.outstanding.to_sat())
    .bind(value_out.to_sat())
    .bind(block.tx.len() as i64)
    .bind(fees.to_sat())
    .execute(uow.conn())
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpc_core::ScriptPubKey;

    fn output(n: u32, btc: f64, kind: &str) -> TxOut {
        TxOut {
            value: Amount::from_btc(btc),
            n,
            script_pub_key: ScriptPubKey {
                asm: String::new(),
                hex: String::new(),
                kind: kind.to_string(),
                addresses: None,
                address: Some("alice".to_string()),
            },
        }
    }

    #[test]
    fn test_issuance_skips_leading_data_output() {
        let outputs = vec![
            output(0, 0.0, "nulldata"),
            output(1, 0.0, "pubkeyhash"),
            output(2, 50.0, "pubkeyhash"),
            output(3, 1.0, "pubkeyhash"),
        ];
        assert_eq!(coinbase_issuance(&outputs), Amount::from_btc(50.0));
    }

    #[test]
    fn test_issuance_of_valueless_coinbase() {
        assert_eq!(coinbase_issuance(&[]), Amount::ZERO);
        assert_eq!(coinbase_issuance(&[output(0, 0.0, "pubkeyhash")]), Amount::ZERO);
    }
}
