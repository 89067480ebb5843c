//! Per-network constants the indexer cannot learn from the daemon.

use std::collections::HashSet;

use rpc_core::{ChainSource, Hash};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CoinConfig;
use crate::error::{IndexerError, Result};

/// Static description of a supported chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinProfile {
    pub name: String,
    pub genesis_hash: Hash,
    /// Previous-hash recorded for height 0, which has no real predecessor.
    pub genesis_prev_hash: Hash,
    /// Transactions recorded as present but carrying no value.
    pub empty_transactions: HashSet<Hash>,
}

/// Coins with a built-in profile.
pub const SUPPORTED_COINS: [&str; 4] = ["Bitcoin", "Litecoin", "Defcoin", "Woodcoin"];

const BITCOIN_GENESIS: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
const LITECOIN_GENESIS: &str = "12a765e31ffd4059bada1e25190f6e98c99d9714d334efa41a195a7e7e04bfe2";
const DEFCOIN_GENESIS: &str = "192047379f33ffd2bbbab3d53b9c4b9e9b72e48f888eadb3dcf57de95a6038ad";
const WOODCOIN_GENESIS: &str = "30758383eae55ae5c7752b73388c1c85bdfbe930ad25ad877252841ed1e734a4";

// Woodcoin's genesis coinbase has no retrievable body.
const WOODCOIN_EMPTY_TXS: [&str; 1] =
    ["d508b7916ec00595c1f8e1c767dc3b37392a5e68adf98118bca80a2ed58331d6"];

/// A profile described in the config file for a coin without a built-in one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomProfile {
    pub genesis_hash: String,
    #[serde(default)]
    pub genesis_prev_hash: Option<String>,
    #[serde(default)]
    pub empty_transactions: Vec<String>,
}

impl CoinProfile {
    fn builtin(name: &str, genesis: &'static str, empty: &[&'static str]) -> Self {
        Self {
            name: name.to_string(),
            genesis_hash: Hash::from_static(genesis),
            genesis_prev_hash: Hash::zero(),
            empty_transactions: empty.iter().copied().map(Hash::from_static).collect(),
        }
    }

    pub fn bitcoin() -> Self {
        Self::builtin("Bitcoin", BITCOIN_GENESIS, &[])
    }

    pub fn litecoin() -> Self {
        Self::builtin("Litecoin", LITECOIN_GENESIS, &[])
    }

    pub fn defcoin() -> Self {
        Self::builtin("Defcoin", DEFCOIN_GENESIS, &[])
    }

    pub fn woodcoin() -> Self {
        Self::builtin("Woodcoin", WOODCOIN_GENESIS, &WOODCOIN_EMPTY_TXS)
    }

    pub fn all() -> Vec<Self> {
        vec![Self::bitcoin(), Self::litecoin(), Self::defcoin(), Self::woodcoin()]
    }

    /// Case-insensitive lookup of a built-in profile.
    pub fn by_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|profile| profile.name.eq_ignore_ascii_case(name))
    }

    /// The built-in profile whose genesis block hashes to `genesis`.
    pub fn detect(genesis: &Hash) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|profile| &profile.genesis_hash == genesis)
    }

    pub fn from_custom(name: &str, custom: &CustomProfile) -> Result<Self> {
        let parse = |field: &str, value: &str| {
            value.parse::<Hash>().map_err(|e| {
                IndexerError::Config(format!("coin `{name}` {field}: {e}"))
            })
        };

        let genesis_prev_hash = match &custom.genesis_prev_hash {
            Some(prev) => parse("genesis_prev_hash", prev)?,
            None => Hash::zero(),
        };
        let empty_transactions = custom
            .empty_transactions
            .iter()
            .map(|txid| parse("empty_transactions", txid))
            .collect::<Result<_>>()?;

        Ok(Self {
            name: name.to_string(),
            genesis_hash: parse("genesis_hash", &custom.genesis_hash)?,
            genesis_prev_hash,
            empty_transactions,
        })
    }

    pub fn is_empty_transaction(&self, txid: &Hash) -> bool {
        self.empty_transactions.contains(txid)
    }

    /// Checks the daemon really serves this coin.
    pub fn verify_genesis(&self, found: &Hash) -> Result<()> {
        if &self.genesis_hash != found {
            return Err(IndexerError::CoinMismatch {
                coin: self.name.clone(),
                expected: self.genesis_hash.clone(),
                found: found.clone(),
            });
        }
        Ok(())
    }
}

/// Picks the profile for the coin `source` serves.
///
/// A configured coin is checked against the daemon's genesis block; without
/// one the genesis hash selects a built-in profile.
pub async fn resolve_profile(config: &CoinConfig, source: &dyn ChainSource) -> Result<CoinProfile> {
    let genesis = source.hash_at(0).await?;

    let profile = match (&config.name, &config.custom) {
        (Some(name), Some(custom)) => CoinProfile::from_custom(name, custom)?,
        (Some(name), None) => CoinProfile::by_name(name).ok_or_else(|| {
            IndexerError::Config(format!(
                "unknown coin `{name}`, supported coins are {}",
                SUPPORTED_COINS.join(", ")
            ))
        })?,
        (None, Some(_)) => {
            return Err(IndexerError::Config(
                "a custom coin profile needs a coin name".to_string(),
            ))
        }
        (None, None) => {
            let detected = CoinProfile::detect(&genesis).ok_or_else(|| {
                IndexerError::Config(format!(
                    "genesis block {genesis} matches no supported coin ({})",
                    SUPPORTED_COINS.join(", ")
                ))
            })?;
            info!("Detected {} from genesis block", detected.name);
            detected
        }
    };

    profile.verify_genesis(&genesis)?;
    Ok(profile)
}
