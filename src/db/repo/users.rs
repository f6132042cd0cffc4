//! User balance operations for the repository.
//!
//! Balances are only ever changed with in-store arithmetic, never written
//! back from a value read earlier.

use crate::domain::{TimeMs, UserBalance, UserId};

use super::{balance_from_row, Repository};

impl Repository {
    /// Create a user with a starting balance. Returns false if the id exists.
    pub async fn create_user(
        &self,
        user_id: &UserId,
        coins: i64,
        created_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, coins, pending_winning_coins, created_at_ms)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(user_id.as_str())
        .bind(coins)
        .bind(created_at.as_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_balance(&self, user_id: &UserId) -> Result<Option<UserBalance>, sqlx::Error> {
        let row = sqlx::query("SELECT id, coins, pending_winning_coins FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(balance_from_row).transpose()
    }

    /// Move `amount` from pending winnings into spendable coins.
    ///
    /// Returns false when the pending pool no longer holds `amount`, or when
    /// the coins would no longer fit in an `i64`.
    pub async fn move_pending_to_coins(
        &self,
        user_id: &UserId,
        amount: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET coins = coins + ?, pending_winning_coins = pending_winning_coins - ?
            WHERE id = ? AND pending_winning_coins >= ? AND coins <= ? - ?
            "#,
        )
        .bind(amount)
        .bind(amount)
        .bind(user_id.as_str())
        .bind(amount)
        .bind(i64::MAX)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
