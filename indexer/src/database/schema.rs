//! Database schema definitions
//!
//! Amounts are INTEGER satoshis. `blocks.nexthash` stays NULL until the
//! successor is indexed and `txout.address` is NULL for scripts without a
//! decodable destination.

/// Every table the ledger owns, in creation order.
pub const LEDGER_TABLES: [&str; 7] = [
    "blocks",
    "txs",
    "coinbase_txin",
    "txin",
    "txout",
    "addresses",
    "address_summary",
];

pub const CREATE_BLOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    hash TEXT PRIMARY KEY NOT NULL,
    height INTEGER NOT NULL UNIQUE,
    prevhash TEXT NOT NULL,
    nexthash TEXT,
    version INTEGER NOT NULL,
    merkleroot TEXT NOT NULL,
    time INTEGER NOT NULL,
    bits TEXT NOT NULL,
    nonce INTEGER NOT NULL,
    size INTEGER NOT NULL,
    difficulty REAL NOT NULL,
    cumulative_difficulty REAL NOT NULL,
    outstanding INTEGER NOT NULL,
    value_out INTEGER NOT NULL,
    transactions INTEGER NOT NULL,
    transaction_fees INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blocks_prevhash ON blocks(prevhash);
"#;

pub const CREATE_TXS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS txs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    txid TEXT NOT NULL,
    block_height INTEGER NOT NULL,
    n INTEGER NOT NULL,
    size INTEGER,
    version INTEGER,
    locktime INTEGER,
    total_out INTEGER NOT NULL,
    total_in INTEGER NOT NULL,
    fee INTEGER NOT NULL,
    UNIQUE (block_height, n)
);

CREATE INDEX IF NOT EXISTS idx_txs_txid ON txs(txid);
"#;

pub const CREATE_COINBASE_TXIN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS coinbase_txin (
    block_height INTEGER PRIMARY KEY NOT NULL,
    txid TEXT NOT NULL,
    scriptsig TEXT NOT NULL,
    sequence INTEGER NOT NULL
);
"#;

pub const CREATE_TXIN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS txin (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    block_height INTEGER NOT NULL,
    txid TEXT NOT NULL,
    n INTEGER NOT NULL,
    scriptsig TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    prevout_hash TEXT NOT NULL,
    prevout_n INTEGER NOT NULL,
    address TEXT,
    value INTEGER NOT NULL,
    UNIQUE (block_height, txid, n),
    UNIQUE (prevout_hash, prevout_n)
);

CREATE INDEX IF NOT EXISTS idx_txin_txid ON txin(txid);
"#;

pub const CREATE_TXOUT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS txout (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    block_height INTEGER NOT NULL,
    txid TEXT NOT NULL,
    n INTEGER NOT NULL,
    value INTEGER NOT NULL,
    scriptpubkey TEXT NOT NULL,
    script_type TEXT NOT NULL,
    address TEXT,
    spent INTEGER NOT NULL DEFAULT 0,
    linked_txid TEXT,
    linked_n INTEGER,
    UNIQUE (block_height, txid, n)
);

CREATE INDEX IF NOT EXISTS idx_txout_outpoint ON txout(txid, n);
CREATE INDEX IF NOT EXISTS idx_txout_address ON txout(address);
"#;

pub const CREATE_ADDRESSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS addresses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL,
    amount INTEGER NOT NULL,
    n INTEGER NOT NULL,
    in_block INTEGER NOT NULL,
    txid TEXT NOT NULL,
    direction TEXT NOT NULL CHECK (direction IN ('in', 'out'))
);

CREATE INDEX IF NOT EXISTS idx_addresses_address ON addresses(address);
CREATE INDEX IF NOT EXISTS idx_addresses_txid ON addresses(txid);
"#;

pub const CREATE_ADDRESS_SUMMARY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS address_summary (
    address TEXT PRIMARY KEY NOT NULL,
    balance INTEGER NOT NULL,
    received INTEGER NOT NULL,
    sent INTEGER NOT NULL,
    transactions_in INTEGER NOT NULL,
    transactions_out INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_address_summary_balance ON address_summary(balance);
"#;

/// Creation statements for every ledger table.
pub const CREATE_ALL: [&str; 7] = [
    CREATE_BLOCKS_TABLE,
    CREATE_TXS_TABLE,
    CREATE_COINBASE_TXIN_TABLE,
    CREATE_TXIN_TABLE,
    CREATE_TXOUT_TABLE,
    CREATE_ADDRESSES_TABLE,
    CREATE_ADDRESS_SUMMARY_TABLE,
];
