//! Chain-wide running totals and the link to the previous block

use rpc_core::{Amount, Hash};
use sqlx::SqlitePool;
use tracing::debug;

use crate::database::queries::BlockQueries;
use crate::database::UnitOfWork;
use crate::error::{IndexerError, Result};

/// Scalars carried from one block to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningTotals {
    pub cumulative_difficulty: f64,
    pub outstanding: Amount,
}

impl RunningTotals {
    /// Totals after a block with the given difficulty, issuance and fees.
    pub fn advance(self, difficulty: f64, issuance: Amount, fees: Amount) -> Self {
        Self {
            cumulative_difficulty: self.cumulative_difficulty + difficulty,
            outstanding: self.outstanding + issuance - fees,
        }
    }
}

pub struct AggregateTracker;

impl AggregateTracker {
    /// Totals as of the block just below `start`, read from committed state.
    pub async fn seed(pool: &SqlitePool, start: u64) -> Result<RunningTotals> {
        if start == 0 {
            return Ok(RunningTotals::default());
        }

        let previous = BlockQueries::get_by_height(pool, start as i64 - 1)
            .await?
            .ok_or(IndexerError::MissingPredecessor { height: start })?;

        Ok(RunningTotals {
            cumulative_difficulty: previous.cumulative_difficulty,
            outstanding: previous.outstanding(),
        })
    }

    /// Checks that the block at `height` builds on the stored block below it
    /// and fills in that block's next-hash if it was still unknown.
    pub async fn link_predecessor(
        uow: &mut UnitOfWork,
        height: u64,
        hash: &Hash,
        prevhash: &Hash,
    ) -> Result<()> {
        if height == 0 {
            return Ok(());
        }

        let predecessor = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT hash, nexthash FROM blocks WHERE height = ?",
        )
        .bind(height as i64 - 1)
        .fetch_optional(uow.conn())
        .await?;

        let Some((stored_hash, nexthash)) = predecessor else {
            return Err(IndexerError::MissingPredecessor { height });
        };

        if stored_hash != prevhash.as_str() {
            return Err(IndexerError::ChainLinkage {
                height,
                expected: stored_hash,
                found: prevhash.to_string(),
            });
        }

        match nexthash {
            None => {
                debug!("Patching next hash of block {}", height - 1);
                sqlx::query("UPDATE blocks SET nexthash = ? WHERE height = ? AND nexthash IS NULL")
                    .bind(hash.as_str())
                    .bind(height as i64 - 1)
                    .execute(uow.conn())
                    .await?;
            }
            Some(next) if next != hash.as_str() => {
                return Err(IndexerError::ChainLinkage {
                    height,
                    expected: next,
                    found: hash.to_string(),
                });
            }
            Some(_) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use tempfile::tempdir;

    fn hash(c: char) -> Hash {
        c.to_string().repeat(64).parse().unwrap()
    }

    async fn insert_block(db: &Database, height: i64, hash: &Hash, nexthash: Option<&Hash>) {
        sqlx::query(
            r#"
            INSERT INTO blocks (
                hash, height, prevhash, nexthash, version, merkleroot, time, bits, nonce,
                size, difficulty, cumulative_difficulty, outstanding, value_out,
                transactions, transaction_fees
            ) VALUES (?, ?, ?, ?, 1, ?, 0, '1d00ffff', 0, 285, 1.5, 4.5, 15000000000, 0, 1, 0)
            "#,
        )
        .bind(hash.as_str())
        .bind(height)
        .bind(Hash::zero().as_str())
        .bind(nexthash.map(|h| h.as_str().to_string()))
        .bind(Hash::zero().as_str())
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[test]
    fn test_advance() {
        let totals = RunningTotals::default()
            .advance(1.0, Amount::from_btc(50.0), Amount::ZERO)
            .advance(2.5, Amount::from_btc(50.0), Amount::from_btc(0.1));
        assert_eq!(totals.cumulative_difficulty, 3.5);
        assert_eq!(totals.outstanding, Amount::from_btc(99.9));
    }

    #[tokio::test]
    async fn test_seed() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db"), 1).await.unwrap();
        db.migrate().await.unwrap();

        assert_eq!(AggregateTracker::seed(db.pool(), 0).await.unwrap(), RunningTotals::default());
        assert!(matches!(
            AggregateTracker::seed(db.pool(), 3).await,
            Err(IndexerError::MissingPredecessor { height: 3 })
        ));

        insert_block(&db, 2, &hash('a'), None).await;
        let totals = AggregateTracker::seed(db.pool(), 3).await.unwrap();
        assert_eq!(totals.cumulative_difficulty, 4.5);
        assert_eq!(totals.outstanding, Amount::from_btc(150.0));
    }

    #[tokio::test]
    async fn test_link_patches_unknown_next_hash() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db"), 1).await.unwrap();
        db.migrate().await.unwrap();
        insert_block(&db, 0, &hash('a'), None).await;

        let mut uow = db.begin().await.unwrap();
        let err = AggregateTracker::link_predecessor(&mut uow, 1, &hash('b'), &hash('c'))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::ChainLinkage { height: 1, .. }));

        AggregateTracker::link_predecessor(&mut uow, 1, &hash('b'), &hash('a'))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let block = BlockQueries::get_by_height(db.pool(), 0).await.unwrap().unwrap();
        assert_eq!(block.nexthash.as_deref(), Some(hash('b').as_str()));
    }

    #[tokio::test]
    async fn test_link_rejects_conflicting_next_hash() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db"), 1).await.unwrap();
        db.migrate().await.unwrap();
        insert_block(&db, 0, &hash('a'), Some(&hash('d'))).await;

        let mut uow = db.begin().await.unwrap();
        let err = AggregateTracker::link_predecessor(&mut uow, 1, &hash('b'), &hash('a'))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::ChainLinkage { .. }));

        let err = AggregateTracker::link_predecessor(&mut uow, 5, &hash('b'), &hash('a'))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::MissingPredecessor { height: 5 }));
    }
}
