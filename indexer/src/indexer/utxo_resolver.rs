//! Resolution of spending inputs against previously indexed outputs

use rpc_core::{Amount, Hash, Prevout};
use sqlx::Row;

use crate::database::UnitOfWork;
use crate::error::{IndexerError, Result};

/// Value and owner of an output consumed by an input.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutput {
    pub value: Amount,
    pub address: Option<String>,
}

pub struct UtxoResolver;

impl UtxoResolver {
    /// Marks the output `prevout` as spent by input `input_n` of `spender`
    /// and returns what it was worth.
    ///
    /// Only outputs of blocks below `height` are candidates, so an input can
    /// never consume an output of the block being built.
    pub async fn resolve(
        uow: &mut UnitOfWork,
        prevout: &Prevout,
        spender: &Hash,
        input_n: u32,
        height: u64,
    ) -> Result<ResolvedOutput> {
        let unspent = sqlx::query(
            r#"
            SELECT id, value, address
            FROM txout
            WHERE txid = ? AND n = ? AND block_height < ? AND spent = 0
            ORDER BY block_height DESC
            LIMIT 1
            "#,
        )
        .bind(prevout.txid.as_str())
        .bind(i64::from(prevout.vout))
        .bind(height as i64)
        .fetch_optional(uow.conn())
        .await?;

        let Some(row) = unspent else {
            return Err(Self::miss(uow, prevout, height).await);
        };

        let id: i64 = row.try_get("id")?;
        let value: i64 = row.try_get("value")?;
        let address: Option<String> = row.try_get("address")?;

        sqlx::query("UPDATE txout SET spent = 1, linked_txid = ?, linked_n = ? WHERE id = ?")
            .bind(spender.as_str())
            .bind(i64::from(input_n))
            .bind(id)
            .execute(uow.conn())
            .await?;

        Ok(ResolvedOutput {
            value: Amount::from_sat(value),
            address,
        })
    }

    /// Tells a double spend apart from a reference to nothing at all.
    async fn miss(uow: &mut UnitOfWork, prevout: &Prevout, height: u64) -> IndexerError {
        let spent = sqlx::query_as::<_, (Option<String>, Option<i64>)>(
            r#"
            SELECT linked_txid, linked_n
            FROM txout
            WHERE txid = ? AND n = ? AND block_height < ? AND spent = 1
            LIMIT 1
            "#,
        )
        .bind(prevout.txid.as_str())
        .bind(i64::from(prevout.vout))
        .bind(height as i64)
        .fetch_optional(uow.conn())
        .await;

        match spent {
            Ok(Some((txid, n))) => IndexerError::AlreadySpent {
                prevout: prevout.clone(),
                spent_by: format!(
                    "{}:{}",
                    txid.unwrap_or_default(),
                    n.map(|n| n.to_string()).unwrap_or_default()
                ),
            },
            Ok(None) => IndexerError::DanglingReference {
                prevout: prevout.clone(),
                height,
            },
            Err(e) => e.into(),
        }
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

    async fn insert_output(uow: &mut UnitOfWork, height: i64, txid: &Hash, n: i64, value: i64) {
        sqlx::query(
            r#"
            INSERT INTO txout (block_height, txid, n, value, scriptpubkey, script_type, address)
            VALUES (?, ?, ?, ?, 'OP_DUP', 'pubkeyhash', 'alice')
            "#,
        )
        .bind(height)
        .bind(txid.as_str())
        .bind(n)
        .bind(value)
        .execute(uow.conn())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_resolve_marks_output_spent() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db"), 1).await.unwrap();
        db.migrate().await.unwrap();

        let funding = hash('a');
        let spender = hash('b');
        let mut uow = db.begin().await.unwrap();
        insert_output(&mut uow, 1, &funding, 0, 5_000).await;

        let prevout = Prevout { txid: funding.clone(), vout: 0 };
        let resolved = UtxoResolver::resolve(&mut uow, &prevout, &spender, 3, 2).await.unwrap();
        assert_eq!(resolved.value, Amount::from_sat(5_000));
        assert_eq!(resolved.address.as_deref(), Some("alice"));

        let (spent, linked_txid, linked_n): (bool, String, i64) =
            sqlx::query_as("SELECT spent, linked_txid, linked_n FROM txout WHERE txid = ?")
                .bind(funding.as_str())
                .fetch_one(uow.conn())
                .await
                .unwrap();
        assert!(spent);
        assert_eq!(linked_txid, spender.as_str());
        assert_eq!(linked_n, 3);

        // A second spend of the same output is refused
        let err = UtxoResolver::resolve(&mut uow, &prevout, &hash('c'), 0, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::AlreadySpent { ref spent_by, .. } if spent_by.ends_with(":3")));
    }

    #[tokio::test]
    async fn test_output_of_current_block_is_dangling() {
        let temp_dir = tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db"), 1).await.unwrap();
        db.migrate().await.unwrap();

        let funding = hash('a');
        let mut uow = db.begin().await.unwrap();
        insert_output(&mut uow, 4, &funding, 1, 100).await;

        let prevout = Prevout { txid: funding, vout: 1 };
        let err = UtxoResolver::resolve(&mut uow, &prevout, &hash('b'), 0, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::DanglingReference { height: 4, .. }));

        let missing = Prevout { txid: hash('f'), vout: 0 };
        let err = UtxoResolver::resolve(&mut uow, &missing, &hash('b'), 0, 9)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::DanglingReference { .. }));
    }
}
