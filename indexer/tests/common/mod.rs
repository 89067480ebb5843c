//! In-memory chain daemon for driving the indexer end to end.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ledger_indexer::database::Database;
use ledger_indexer::CoinProfile;
use rpc_core::{
    Amount, ChainSource, Hash, Prevout, RawBlock, RawTx, RpcError, ScriptPubKey, ScriptSig, TxIn,
    TxOut,
};

const BLOCK_TAG: u8 = 0xb1;
const TX_TAG: u8 = 0x7a;

pub fn hash(tag: u8, n: u64) -> Hash {
    format!("{tag:02x}{n:062x}").parse().unwrap()
}

#[derive(Default)]
struct ChainState {
    blocks: Vec<RawBlock>,
    txs: HashMap<Hash, RawTx>,
    next_id: u64,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_txid(&self) -> Hash {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        hash(TX_TAG, state.next_id)
    }

    /// A transaction id the daemon will never be able to produce.
    pub fn unknown_txid(&self) -> Hash {
        self.next_txid()
    }

    pub fn coinbase(&self, outputs: &[(Option<&str>, f64)]) -> RawTx {
        RawTx {
            txid: self.next_txid(),
            version: 1,
            locktime: 0,
            size: 134,
            vin: vec![TxIn::Coinbase {
                coinbase: "04ffff001d0104".to_string(),
                sequence: u64::from(u32::MAX),
            }],
            vout: build_outputs(outputs),
        }
    }

    pub fn reward(&self, address: &str, btc: f64) -> RawTx {
        self.coinbase(&[(Some(address), btc)])
    }

    pub fn transfer(&self, inputs: &[(&RawTx, u32)], outputs: &[(Option<&str>, f64)]) -> RawTx {
        let vin = inputs
            .iter()
            .map(|(tx, vout)| TxIn::Spend {
                prevout: Prevout {
                    txid: tx.txid.clone(),
                    vout: *vout,
                },
                script_sig: ScriptSig {
                    asm: "3045022100 02ab".to_string(),
                    hex: String::new(),
                },
                sequence: u64::from(u32::MAX),
            })
            .collect();

        RawTx {
            txid: self.next_txid(),
            version: 1,
            locktime: 0,
            size: 226,
            vin,
            vout: build_outputs(outputs),
        }
    }

    /// Appends a block holding `txs`; returns its hash.
    pub fn mine(&self, txs: Vec<RawTx>) -> Hash {
        let ids = txs.iter().map(|tx| tx.txid.clone()).collect();
        self.mine_listing(ids, txs)
    }

    /// Appends a block listing `ids`, of which only `known` can be fetched.
    pub fn mine_listing(&self, ids: Vec<Hash>, known: Vec<RawTx>) -> Hash {
        let mut state = self.state.lock().unwrap();
        let height = state.blocks.len() as u64;
        let block = RawBlock {
            hash: hash(BLOCK_TAG, height * 1_000 + state.next_id),
            height,
            previous_block_hash: state.blocks.last().map(|b| b.hash.clone()),
            next_block_hash: None,
            version: 4,
            merkle_root: hash(0x33, height),
            time: 1_231_006_505 + height as i64 * 600,
            bits: "1d00ffff".to_string(),
            nonce: 2_083_236_893,
            size: 285,
            difficulty: 1.0 + height as f64,
            tx: ids,
        };
        let block_hash = block.hash.clone();
        state.blocks.push(block);
        for tx in known {
            state.txs.insert(tx.txid.clone(), tx);
        }
        block_hash
    }

    /// Replaces the tip with a competing block.
    pub fn replace_tip(&self, txs: Vec<RawTx>) -> Hash {
        {
            let mut state = self.state.lock().unwrap();
            state.blocks.pop();
            state.next_id += 500;
        }
        self.mine(txs)
    }

    pub fn genesis_hash(&self) -> Hash {
        self.state.lock().unwrap().blocks[0].hash.clone()
    }

    pub fn block_hash(&self, height: u64) -> Hash {
        self.state.lock().unwrap().blocks[height as usize].hash.clone()
    }

    pub fn profile(&self) -> CoinProfile {
        CoinProfile {
            name: "Testcoin".to_string(),
            genesis_hash: self.genesis_hash(),
            genesis_prev_hash: Hash::zero(),
            empty_transactions: HashSet::new(),
        }
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn tip_height(&self) -> Result<u64, RpcError> {
        let state = self.state.lock().unwrap();
        match state.blocks.len() {
            0 => Err(RpcError::SourceUnavailable("no blocks yet".to_string())),
            len => Ok(len as u64 - 1),
        }
    }

    async fn hash_at(&self, height: u64) -> Result<Hash, RpcError> {
        let state = self.state.lock().unwrap();
        state
            .blocks
            .get(height as usize)
            .map(|b| b.hash.clone())
            .ok_or_else(|| RpcError::Rpc {
                code: -8,
                message: "Block height out of range".to_string(),
            })
    }

    async fn block(&self, hash: &Hash) -> Result<RawBlock, RpcError> {
        let state = self.state.lock().unwrap();
        let position = state
            .blocks
            .iter()
            .position(|b| &b.hash == hash)
            .ok_or_else(|| RpcError::Rpc {
                code: -5,
                message: "Block not found".to_string(),
            })?;

        let mut block = state.blocks[position].clone();
        block.next_block_hash = state.blocks.get(position + 1).map(|b| b.hash.clone());
        Ok(block)
    }

    async fn raw_tx(&self, txid: &Hash) -> Result<RawTx, RpcError> {
        let state = self.state.lock().unwrap();
        state
            .txs
            .get(txid)
            .cloned()
            .ok_or_else(|| RpcError::TransactionNotFound(txid.clone()))
    }
}

/// Delegates to a [`MockChain`] but never answers for one transaction, the
/// way a daemon that stops responding mid-block looks to the indexer.
pub struct StallingChain {
    pub inner: Arc<MockChain>,
    pub stall_on: Hash,
}

#[async_trait]
impl ChainSource for StallingChain {
    async fn tip_height(&self) -> Result<u64, RpcError> {
        self.inner.tip_height().await
    }

    async fn hash_at(&self, height: u64) -> Result<Hash, RpcError> {
        self.inner.hash_at(height).await
    }

    async fn block(&self, hash: &Hash) -> Result<RawBlock, RpcError> {
        self.inner.block(hash).await
    }

    async fn raw_tx(&self, txid: &Hash) -> Result<RawTx, RpcError> {
        if txid == &self.stall_on {
            std::future::pending::<()>().await;
        }
        self.inner.raw_tx(txid).await
    }
}

fn build_outputs(outputs: &[(Option<&str>, f64)]) -> Vec<TxOut> {
    outputs
        .iter()
        .enumerate()
        .map(|(n, (address, btc))| TxOut {
            value: Amount::from_btc(*btc),
            n: n as u32,
            script_pub_key: match address {
                Some(address) => ScriptPubKey {
                    asm: format!("OP_DUP OP_HASH160 {address} OP_EQUALVERIFY OP_CHECKSIG"),
                    hex: String::new(),
                    kind: "pubkeyhash".to_string(),
                    addresses: Some(vec![address.to_string()]),
                    address: None,
                },
                None => ScriptPubKey {
                    asm: "OP_RETURN 6a24aa21a9ed".to_string(),
                    hex: String::new(),
                    kind: "nulldata".to_string(),
                    addresses: None,
                    address: None,
                },
            },
        })
        .collect()
}

pub async fn open_database(dir: &Path) -> Arc<Database> {
    let db = Database::new(&dir.join("ledger.db"), 1).await.unwrap();
    db.ensure_schema(true).await.unwrap();
    Arc::new(db)
}
