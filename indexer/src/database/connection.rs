//! Database connection management

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::Executor;
use tracing::{info, warn};

use crate::database::schema::{CREATE_ALL, LEDGER_TABLES};
use crate::database::unit_of_work::UnitOfWork;
use crate::error::{IndexerError, Result};

pub struct Database {
    pool: sqlx::SqlitePool,
}

impl Database {
    pub async fn new(database_path: &Path, max_connections: u32) -> Result<Self> {
        // Ensure the database directory exists
        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Opens the unit of work that carries one height's writes.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        Ok(UnitOfWork::new(self.pool.begin().await?))
    }

    /// Creates any missing ledger table.
    pub async fn migrate(&self) -> Result<()> {
        for statement in CREATE_ALL {
            self.pool.execute(statement).await?;
        }
        Ok(())
    }

    /// Names of all user tables currently in the database.
    pub async fn existing_tables(&self) -> Result<BTreeSet<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names.into_iter().collect())
    }

    /// Creates the schema in an empty database and refuses to touch one whose
    /// tables differ from the ledger's.
    pub async fn ensure_schema(&self, autodetect_tables: bool) -> Result<()> {
        if !autodetect_tables {
            return self.migrate().await;
        }

        let detected = self.existing_tables().await?;
        if detected.is_empty() {
            info!("Empty database, creating ledger tables");
            return self.migrate().await;
        }

        let expected: BTreeSet<String> = LEDGER_TABLES.iter().map(|t| t.to_string()).collect();
        let extra: Vec<_> = detected.difference(&expected).cloned().collect();
        if !extra.is_empty() {
            return Err(IndexerError::Schema(format!(
                "unexpected tables detected: {}",
                extra.join(", ")
            )));
        }
        let missing: Vec<_> = expected.difference(&detected).cloned().collect();
        if !missing.is_empty() {
            return Err(IndexerError::Schema(format!(
                "expected tables are missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// Drops every ledger table and recreates an empty schema.
    pub async fn reset(&self) -> Result<()> {
        warn!("Dropping all ledger tables");
        let mut tx = self.pool.begin().await?;
        for table in LEDGER_TABLES.iter().rev() {
            (&mut *tx)
                .execute(format!("DROP TABLE IF EXISTS {table}").as_str())
                .await?;
        }
        tx.commit().await?;
        self.migrate().await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
