use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ledger-indexer")]
#[command(about = "Import blocks from a chain daemon into the SQL ledger", long_about = None)]
pub struct Args {
    /// Path to configuration file (optional, uses defaults if missing)
    #[arg(short, long, default_value = "ledger.toml")]
    pub config_path: PathBuf,

    /// SQLite database file
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Daemon RPC endpoint, e.g. http://127.0.0.1:8332/
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Daemon RPC user
    #[arg(long)]
    pub rpc_user: Option<String>,

    /// Daemon RPC password
    #[arg(long)]
    pub rpc_password: Option<String>,

    /// Coin name (Bitcoin, Litecoin, Defcoin, Woodcoin); detected when omitted
    #[arg(long)]
    pub coin: Option<String>,

    /// Stop after importing this height
    #[arg(long)]
    pub until: Option<u64>,

    /// Drop every ledger table and import from genesis
    #[arg(long)]
    pub reset: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

pub fn parse_args() -> Args {
    Args::parse()
}
