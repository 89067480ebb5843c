//! RPC data models and types
//!
//! Daemon responses are decoded into these records at the client boundary, so
//! a missing or malformed field fails there instead of deep inside block
//! processing.

use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Satoshis per coin.
pub const COIN: i64 = 100_000_000;

/// Script type the daemon reports for provably unspendable data carriers.
pub const NULLDATA: &str = "nulldata";

/// Script type the daemon reports for scripts it cannot classify.
pub const NONSTANDARD: &str = "nonstandard";

/// RPC error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("Chain source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(Hash),

    #[error("Malformed {method} response: {message}")]
    Parse { method: String, message: String },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

impl RpcError {
    pub fn parse(method: &str, message: impl fmt::Display) -> Self {
        RpcError::Parse {
            method: method.to_string(),
            message: message.to_string(),
        }
    }
}

/// A 32-byte block or transaction hash in the daemon's hex notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid hash {0:?}: expected 64 hex characters")]
pub struct InvalidHash(pub String);

impl Hash {
    pub const HEX_LEN: usize = 64;

    /// The all-zero hash genesis blocks use as their previous hash.
    pub fn zero() -> Self {
        Hash("0".repeat(Self::HEX_LEN))
    }

    /// Wraps a built-in hash literal without validating it.
    ///
    /// Only for compile-time constants written in lowercase hex; anything
    /// coming from outside goes through [`FromStr`].
    pub fn from_static(hex: &'static str) -> Self {
        Hash(hex.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = InvalidHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN || hex::decode(s).is_err() {
            return Err(InvalidHash(s.to_string()));
        }
        Ok(Hash(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Hash {
    type Error = InvalidHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed amount of satoshis.
///
/// The daemon reports values as decimal coins; they are converted once, at
/// decode time, by rounding to the nearest satoshi.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_sat(sat: i64) -> Self {
        Amount(sat)
    }

    pub fn from_btc(btc: f64) -> Self {
        Amount((btc * COIN as f64).round() as i64)
    }

    pub const fn to_sat(self) -> i64 {
        self.0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let btc = f64::deserialize(deserializer)?;
        if !btc.is_finite() || btc < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid amount {btc}")));
        }
        Ok(Amount::from_btc(btc))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:08}", abs / COIN as u64, abs % COIN as u64)
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

/// `getblock <hash>` at verbosity 1.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawBlock {
    pub hash: Hash,
    pub height: u64,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<Hash>,
    #[serde(rename = "nextblockhash", default)]
    pub next_block_hash: Option<Hash>,
    pub version: i64,
    #[serde(rename = "merkleroot")]
    pub merkle_root: Hash,
    pub time: i64,
    pub bits: String,
    pub nonce: u64,
    pub size: u64,
    pub difficulty: f64,
    pub tx: Vec<Hash>,
}

/// `getrawtransaction <txid> true`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTx {
    pub txid: Hash,
    pub version: i64,
    pub locktime: u64,
    pub size: u64,
    pub vin: Vec<TxIn>,
    pub vout: Vec<TxOut>,
}

impl RawTx {
    pub fn total_out(&self) -> Amount {
        self.vout.iter().map(|out| out.value).sum()
    }
}

/// Reference to the output an input spends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Prevout {
    pub txid: Hash,
    pub vout: u32,
}

impl fmt::Display for Prevout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// A transaction input: either the block's coinbase or a spend of a prevout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "TxInRepr")]
pub enum TxIn {
    Coinbase {
        /// Hex-encoded coinbase script.
        coinbase: String,
        sequence: u64,
    },
    Spend {
        prevout: Prevout,
        script_sig: ScriptSig,
        sequence: u64,
    },
}

impl TxIn {
    pub fn is_coinbase(&self) -> bool {
        matches!(self, TxIn::Coinbase { .. })
    }
}

#[derive(Deserialize)]
struct TxInRepr {
    coinbase: Option<String>,
    txid: Option<Hash>,
    vout: Option<u32>,
    #[serde(rename = "scriptSig")]
    script_sig: Option<ScriptSig>,
    sequence: u64,
}

impl TryFrom<TxInRepr> for TxIn {
    type Error = String;

    fn try_from(repr: TxInRepr) -> Result<Self, Self::Error> {
        if let Some(coinbase) = repr.coinbase {
            return Ok(TxIn::Coinbase {
                coinbase,
                sequence: repr.sequence,
            });
        }
        match (repr.txid, repr.vout) {
            (Some(txid), Some(vout)) => Ok(TxIn::Spend {
                prevout: Prevout { txid, vout },
                script_sig: repr.script_sig.unwrap_or_default(),
                sequence: repr.sequence,
            }),
            _ => Err("input has neither `coinbase` nor `txid`/`vout`".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptSig {
    pub asm: String,
    #[serde(default)]
    pub hex: String,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptPubKey {
    pub asm: String,
    #[serde(default)]
    pub hex: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Older daemons list destinations here.
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    /// Newer daemons report a single destination.
    #[serde(default)]
    pub address: Option<String>,
}

impl ScriptPubKey {
    pub fn is_nulldata(&self) -> bool {
        self.kind == NULLDATA
    }

    /// The address this script pays to, or `None` for data carriers and
    /// scripts the daemon could not decode.
    pub fn destination(&self) -> Option<&str> {
        if self.kind == NULLDATA || self.kind == NONSTANDARD {
            return None;
        }
        self.address
            .as_deref()
            .or_else(|| self.addresses.as_ref().and_then(|a| a.first()).map(String::as_str))
    }
}
