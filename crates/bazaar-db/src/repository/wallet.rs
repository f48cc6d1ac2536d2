//! # Wallet Repository
//!
//! Balance row plus an append-only ledger. Every balance change writes
//! exactly one ledger row in the same statement sequence, so
//! `balance == Σ credits − Σ debits` holds whenever the caller commits.
//!
//! ```text
//! credit: balance += a                       → insert credit row
//! debit:  balance -= a WHERE balance >= a    → insert debit row
//!                      (0 rows) → DebitOutcome::Insufficient
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use bazaar_core::{Money, Wallet, WalletTransaction};

const TX_COLUMNS: &str = "id, user_id, amount_paise, kind, description, created_at";

/// Result of a guarded debit.
#[derive(Debug)]
pub enum DebitOutcome {
    Applied(WalletTransaction),
    /// Balance did not cover the amount; nothing was written.
    Insufficient { balance: Money },
}

#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    pub async fn find(&self, user_id: &str) -> DbResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(
            "SELECT user_id, balance_paise, updated_at FROM wallets WHERE user_id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(wallet)
    }

    /// The user's wallet; users who never had one see an empty wallet.
    pub async fn get_or_empty(&self, user_id: &str) -> DbResult<Wallet> {
        Ok(self
            .find(user_id)
            .await?
            .unwrap_or_else(|| Wallet::empty(user_id)))
    }

    /// Ledger rows, newest first.
    pub async fn transactions(&self, user_id: &str) -> DbResult<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {TX_COLUMNS} FROM wallet_transactions WHERE user_id = ?1 \
             ORDER BY created_at DESC, rowid DESC"
        );
        let txs = sqlx::query_as::<_, WalletTransaction>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(txs)
    }

    async fn ensure(conn: &mut SqliteConnection, user_id: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO wallets (user_id, balance_paise, updated_at) VALUES (?1, 0, ?2)",
        )
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn append(conn: &mut SqliteConnection, tx: &WalletTransaction) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (id, user_id, amount_paise, kind, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.user_id)
        .bind(tx.amount_paise)
        .bind(tx.kind)
        .bind(&tx.description)
        .bind(tx.created_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Adds money to the wallet, creating it on first use.
    pub async fn credit(
        conn: &mut SqliteConnection,
        user_id: &str,
        amount: Money,
        description: &str,
    ) -> DbResult<WalletTransaction> {
        let tx = WalletTransaction::credit(user_id, amount, description)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        Self::ensure(conn, user_id).await?;
        sqlx::query(
            "UPDATE wallets SET balance_paise = balance_paise + ?2, updated_at = ?3 WHERE user_id = ?1",
        )
        .bind(user_id)
        .bind(amount.paise())
        .bind(tx.created_at)
        .execute(&mut *conn)
        .await?;
        Self::append(conn, &tx).await?;

        info!(user_id = %user_id, amount = %amount, "Wallet credited");
        Ok(tx)
    }

    /// Takes money out of the wallet if the balance covers it.
    pub async fn debit(
        conn: &mut SqliteConnection,
        user_id: &str,
        amount: Money,
        description: &str,
    ) -> DbResult<DebitOutcome> {
        let tx = WalletTransaction::debit(user_id, amount, description)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        Self::ensure(conn, user_id).await?;
        let result = sqlx::query(
            r#"
            UPDATE wallets SET balance_paise = balance_paise - ?2, updated_at = ?3
            WHERE user_id = ?1 AND balance_paise >= ?2
            "#,
        )
        .bind(user_id)
        .bind(amount.paise())
        .bind(tx.created_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let balance: i64 =
                sqlx::query_scalar("SELECT balance_paise FROM wallets WHERE user_id = ?1")
                    .bind(user_id)
                    .fetch_one(&mut *conn)
                    .await?;
            debug!(user_id = %user_id, balance, requested = amount.paise(), "Wallet debit refused");
            return Ok(DebitOutcome::Insufficient {
                balance: Money::from_paise(balance),
            });
        }

        Self::append(conn, &tx).await?;
        info!(user_id = %user_id, amount = %amount, "Wallet debited");
        Ok(DebitOutcome::Applied(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;
    use bazaar_core::wallet::reconcile;

    #[tokio::test]
    async fn test_credit_creates_wallet() {
        let db = database().await;
        assert_eq!(db.wallets().get_or_empty("u1").await.unwrap().balance_paise, 0);

        let mut tx = db.begin().await.unwrap();
        WalletRepository::credit(&mut tx, "u1", Money::from_rupees(540), "Refund")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let wallet = db.wallets().find("u1").await.unwrap().unwrap();
        assert_eq!(wallet.balance(), Money::from_rupees(540));
    }

    #[tokio::test]
    async fn test_debit_guarded_by_balance() {
        let db = database().await;
        let mut tx = db.begin().await.unwrap();
        WalletRepository::credit(&mut tx, "u1", Money::from_rupees(100), "Refund")
            .await
            .unwrap();

        let refused = WalletRepository::debit(&mut tx, "u1", Money::from_rupees(150), "Order")
            .await
            .unwrap();
        assert!(matches!(
            refused,
            DebitOutcome::Insufficient { balance } if balance == Money::from_rupees(100)
        ));

        let applied = WalletRepository::debit(&mut tx, "u1", Money::from_rupees(60), "Order")
            .await
            .unwrap();
        assert!(matches!(applied, DebitOutcome::Applied(_)));
        tx.commit().await.unwrap();

        let wallet = db.wallets().get_or_empty("u1").await.unwrap();
        let ledger = db.wallets().transactions("u1").await.unwrap();
        assert_eq!(wallet.balance(), Money::from_rupees(40));
        assert_eq!(ledger.len(), 2);
        assert_eq!(reconcile(&ledger), wallet.balance());
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let db = database().await;
        let mut tx = db.begin().await.unwrap();
        assert!(WalletRepository::credit(&mut tx, "u1", Money::zero(), "Nothing")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let db = database().await;
        let mut tx = db.begin().await.unwrap();
        let row = WalletRepository::credit(&mut tx, "u1", Money::from_rupees(10), "Refund")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let result = sqlx::query("DELETE FROM wallet_transactions WHERE id = ?1")
            .bind(&row.id)
            .execute(db.pool())
            .await;
        assert!(result.is_err());
    }
}
