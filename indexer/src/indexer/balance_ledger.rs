//! Per-address running balances and the append-only event log

use rpc_core::{Amount, Hash};

use crate::database::UnitOfWork;
use crate::error::{IndexerError, Result};
use crate::models::Direction;

/// Where a balance change came from.
#[derive(Debug, Clone, Copy)]
pub struct EventSource<'a> {
    pub txid: &'a Hash,
    /// Output index for credits, input index for debits.
    pub n: u32,
    pub height: u64,
}

pub struct BalanceLedger;

impl BalanceLedger {
    /// Records an output paying `amount` to `address`.
    pub async fn credit(
        uow: &mut UnitOfWork,
        address: &str,
        amount: Amount,
        source: EventSource<'_>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO address_summary (
                address, balance, received, sent, transactions_in, transactions_out
            ) VALUES (?, ?, ?, 0, 1, 0)
            ON CONFLICT (address) DO UPDATE SET
                balance = balance + excluded.balance,
                received = received + excluded.received,
                transactions_in = transactions_in + 1
            "#,
        )
        .bind(address)
        .bind(amount.to_sat())
        .bind(amount.to_sat())
        .execute(uow.conn())
        .await?;

        Self::record_event(uow, address, amount, Direction::Inbound, source).await
    }

    /// Records `address` spending an output worth `amount`.
    ///
    /// An address that was never credited, or whose balance would go
    /// negative, is rejected.
    pub async fn debit(
        uow: &mut UnitOfWork,
        address: &str,
        amount: Amount,
        source: EventSource<'_>,
    ) -> Result<()> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM address_summary WHERE address = ?")
                .bind(address)
                .fetch_optional(uow.conn())
                .await?;

        let remaining = Amount::from_sat(balance.unwrap_or(0)) - amount;
        if balance.is_none() || remaining.is_negative() {
            return Err(IndexerError::NegativeBalance {
                address: address.to_string(),
                balance: remaining,
            });
        }

        sqlx::query(
            r#"
            UPDATE address_summary SET
                balance = balance - ?,
                sent = sent + ?,
                transactions_out = transactions_out + 1
            WHERE address = ?
            "#,
        )
        .bind(amount.to_sat())
        .bind(amount.to_sat())
        .bind(address)
        .execute(uow.conn())
        .await?;

        Self::record_event(uow, address, amount, Direction::Outbound, source).await
    }

    async fn record_event(
        uow: &mut UnitOfWork,
        address: &str,
        amount: Amount,
        direction: Direction,
        source: EventSource<'_>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO addresses (address, amount, n, in_block, txid, direction)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(address)
        .bind(amount.to_sat())
        .bind(i64::from(source.n))
        .bind(source.height as i64)
        .bind(source.txid.as_str())
        .bind(direction.as_str())
        .execute(uow.conn())
        .await?;

        Ok(())
    }
}
