//! One height's worth of ledger writes.

use sqlx::{Sqlite, SqliteConnection, Transaction};

use crate::error::Result;

/// Wraps the database transaction that every component of a height import
/// writes through.
///
/// Nothing is visible to readers until [`UnitOfWork::commit`]. Dropping the
/// unit without committing rolls it back, which is what happens when the
/// import future is cancelled.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
