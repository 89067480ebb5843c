//! Resume controller: decides what to import and commits height by height

use std::ops::RangeInclusive;
use std::sync::Arc;

use rpc_core::ChainSource;
use tracing::{info, warn};

use crate::coin::CoinProfile;
use crate::database::queries::BlockQueries;
use crate::database::Database;
use crate::error::Result;
use crate::indexer::aggregate_tracker::{AggregateTracker, RunningTotals};
use crate::indexer::block_processor::{BlockProcessor, ProcessedBlock};

/// Where the ledger stands relative to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Heights `range` are available and not yet indexed.
    CatchingUp { range: RangeInclusive<u64> },
    UpToDate,
}

/// What a run imported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported: u64,
    pub last_height: Option<u64>,
    pub skipped_transactions: usize,
}

pub struct IndexerService {
    database: Arc<Database>,
    source: Arc<dyn ChainSource>,
    processor: BlockProcessor,
    stop_height: Option<u64>,
}

impl IndexerService {
    pub fn new(database: Arc<Database>, source: Arc<dyn ChainSource>, profile: CoinProfile) -> Self {
        Self {
            database,
            processor: BlockProcessor::new(source.clone(), profile),
            source,
            stop_height: None,
        }
    }

    /// Never import past `height`.
    pub fn with_stop_height(mut self, height: Option<u64>) -> Self {
        self.stop_height = height;
        self
    }

    pub async fn sync_state(&self) -> Result<SyncState> {
        let last = BlockQueries::last(self.database.pool())
            .await?
            .map(|block| block.height as u64);
        let tip = self.source.tip_height().await?;

        if let Some(last) = last {
            if tip < last {
                warn!("Daemon tip {tip} is below the last indexed height {last}");
            }
        }

        let next = last.map_or(0, |h| h + 1);
        let end = self.stop_height.map_or(tip, |stop| stop.min(tip));
        if next > end {
            return Ok(SyncState::UpToDate);
        }
        Ok(SyncState::CatchingUp { range: next..=end })
    }

    /// Imports everything between the last indexed height and the tip.
    pub async fn run(&self) -> Result<ImportReport> {
        match self.sync_state().await? {
            SyncState::UpToDate => {
                info!("Ledger is up to date");
                Ok(ImportReport::default())
            }
            SyncState::CatchingUp { range } => {
                info!(
                    "Importing blocks {} to {} ({})",
                    range.start(),
                    range.end(),
                    self.processor.profile().name
                );
                self.import_range(range).await
            }
        }
    }

    /// Imports `range` in ascending order, one committed unit of work per
    /// height. The first failure rolls back its height and ends the run.
    pub async fn import_range(&self, range: RangeInclusive<u64>) -> Result<ImportReport> {
        let end = *range.end();
        let mut totals = AggregateTracker::seed(self.database.pool(), *range.start()).await?;
        let mut report = ImportReport::default();

        for height in range {
            let block = self.import_height(height, totals, height == end).await?;
            totals = block.totals;
            report.imported += 1;
            report.last_height = Some(height);
            report.skipped_transactions += block.skipped;
            info!(
                hash = %block.hash,
                issued = %block.issuance,
                fees = %block.transaction_fees,
                value_out = %block.value_out,
                "committed block {height} / {end}"
            );
        }

        Ok(report)
    }

    async fn import_height(
        &self,
        height: u64,
        totals: RunningTotals,
        last_in_batch: bool,
    ) -> Result<ProcessedBlock> {
        let mut uow = self.database.begin().await?;

        match self.processor.process(&mut uow, height, totals, last_in_batch).await {
            Ok(block) => {
                uow.commit().await?;
                Ok(block)
            }
            Err(e) => {
                let storage_full = e.is_storage_full();
                if !storage_full {
                    warn!("Rolling back height {height}: {e}");
                }
                if let Err(rollback) = uow.rollback().await {
                    if !storage_full {
                        warn!("Rollback of height {height} failed: {rollback}");
                    }
                }
                Err(e)
            }
        }
    }
}
