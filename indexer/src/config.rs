use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::coin::CustomProfile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub database: DatabaseConfig,
    pub coin: CoinConfig,
    pub indexer: IndexerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinConfig {
    /// Built-in coin name; detected from the genesis hash when absent.
    pub name: Option<String>,
    /// Profile for a coin without a built-in one. Requires `name`.
    pub custom: Option<CustomProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Refuse to run against a database with extra or missing tables.
    pub autodetect_tables: bool,
    /// Highest height to import in this run.
    pub stop_height: Option<u64>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332/".to_string(),
            user: None,
            password: None,
            timeout_secs: 30,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ledger.db"),
            max_connections: 4,
        }
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            autodetect_tables: true,
            stop_height: None,
        }
    }
}

impl Config {
    /// Load configuration from file if it exists, otherwise use defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Override config with CLI arguments
    pub fn apply_cli_overrides(&mut self, args: &Args) {
        if let Some(path) = &args.database {
            self.database.path = path.clone();
        }

        if let Some(url) = &args.rpc_url {
            self.rpc.url = url.clone();
        }

        if let Some(user) = &args.rpc_user {
            self.rpc.user = Some(user.clone());
        }

        if let Some(password) = &args.rpc_password {
            self.rpc.password = Some(password.clone());
        }

        if let Some(coin) = &args.coin {
            self.coin.name = Some(coin.clone());
        }

        if let Some(until) = args.until {
            self.indexer.stop_height = Some(until);
        }
    }
}
