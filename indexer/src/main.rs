//! Ledger indexer - main entry point

use std::process;
use std::sync::Arc;

use ledger_indexer::{
    cli,
    coin::resolve_profile,
    database::Database,
    rpc_client::RpcClient,
    Config, IndexerError, IndexerService,
};
use rpc_core::ChainSource;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::parse_args();

    init_logging(&args);

    let mut config = match Config::load(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            process::exit(2);
        }
    };
    config.apply_cli_overrides(&args);

    match run(config, args.reset).await {
        Ok(()) => {}
        // Nothing more may be written once storage is exhausted
        Err(e) if e.is_storage_full() => process::exit(3),
        Err(e) => {
            error!("Indexer halted: {e}");
            process::exit(1);
        }
    }
}

async fn run(config: Config, reset: bool) -> Result<(), IndexerError> {
    info!("Database path: {}", config.database.path.display());
    let database = Arc::new(Database::new(&config.database.path, config.database.max_connections).await?);

    if reset {
        database.reset().await?;
    } else {
        database.ensure_schema(config.indexer.autodetect_tables).await?;
    }

    info!("Connecting to chain daemon at {}", config.rpc.url);
    let source: Arc<dyn ChainSource> = Arc::new(RpcClient::new(&config.rpc)?);
    let profile = resolve_profile(&config.coin, source.as_ref()).await?;

    let indexer = IndexerService::new(database.clone(), source, profile)
        .with_stop_height(config.indexer.stop_height);

    let outcome = tokio::select! {
        result = indexer.run() => result.map(Some),
        _ = tokio::signal::ctrl_c() => Ok(None),
    };

    match &outcome {
        Ok(Some(report)) => info!(
            "Imported {} blocks, {} transactions without details",
            report.imported, report.skipped_transactions
        ),
        Ok(None) => warn!("Interrupted, in-flight block rolled back"),
        Err(_) => {}
    }

    database.close().await;
    outcome.map(|_| ())
}

fn init_logging(args: &cli::Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
