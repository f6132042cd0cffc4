//! Round lifecycle operations for the repository.
//!
//! The round timer is the only caller of the mutating methods here.

use crate::domain::{Phase, Round, StoredDigit, TimeMs};
use crate::engine::SettlementPlan;
use sqlx::Row;

use super::{round_from_row, stored_digit, Repository, ROUND_COLUMNS};

/// Result of applying a settlement plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementCommit {
    Committed,
    /// The round was no longer running; nothing was written.
    AlreadyCompleted,
    /// The winner's pending pool could not take the reward (missing user or
    /// `i64` overflow). Rolled back; the round is still running.
    PayoutRefused,
}

impl Repository {
    /// Most recent round by number, whatever its status.
    pub async fn latest_round(&self) -> Result<Option<Round>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM rounds ORDER BY round_number DESC LIMIT 1",
            ROUND_COLUMNS
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(round_from_row).transpose()
    }

    /// The single running round, if any.
    pub async fn active_round(&self) -> Result<Option<Round>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM rounds WHERE status = 'running' ORDER BY round_number DESC LIMIT 1",
            ROUND_COLUMNS
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(round_from_row).transpose()
    }

    pub async fn round_by_number(&self, round_number: i64) -> Result<Option<Round>, sqlx::Error> {
        let sql = format!("SELECT {} FROM rounds WHERE round_number = ?", ROUND_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(round_number)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(round_from_row).transpose()
    }

    pub async fn round_by_id(&self, id: i64) -> Result<Option<Round>, sqlx::Error> {
        let sql = format!("SELECT {} FROM rounds WHERE id = ?", ROUND_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(round_from_row).transpose()
    }

    /// Create round `round_number` in bidding, or return it if it already exists.
    ///
    /// # Errors
    /// Returns `RowNotFound` when the insert was refused because another round
    /// is still running.
    pub async fn start_round(
        &self,
        round_number: i64,
        start_time: TimeMs,
    ) -> Result<Round, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO rounds (round_number, phase, status, bidding_locked, is_manual_winner, start_time_ms)
            VALUES (?, 'bidding', 'running', 0, 0, ?)
            "#,
        )
        .bind(round_number)
        .bind(start_time.as_ms())
        .execute(&self.pool)
        .await?;

        self.round_by_number(round_number)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Close bidding. Moves the phase to calculating unless it is already past it.
    pub async fn lock_bidding(&self, round_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE rounds
            SET bidding_locked = 1,
                phase = CASE WHEN phase = 'bidding' THEN 'calculating' ELSE phase END
            WHERE id = ?
            "#,
        )
        .bind(round_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the pre-computed winner. The first write wins; the stored value
    /// is returned either way.
    pub async fn record_calculated_winner(
        &self,
        round_id: i64,
        winner: StoredDigit,
    ) -> Result<StoredDigit, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE rounds SET calculated_winning_number = ?
            WHERE id = ? AND calculated_winning_number IS NULL
            "#,
        )
        .bind(winner.as_i64())
        .bind(round_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT calculated_winning_number FROM rounds WHERE id = ?")
            .bind(round_id)
            .fetch_one(&self.pool)
            .await?;
        stored_digit(row.try_get("calculated_winning_number")?)?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Move a running round forward to `phase`. Never moves a phase backwards.
    pub async fn advance_phase(&self, round_id: i64, phase: Phase) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE rounds SET phase = ?
            WHERE id = ? AND status = 'running'
              AND (CASE phase
                     WHEN 'bidding' THEN 0
                     WHEN 'calculating' THEN 1
                     WHEN 'playSpin' THEN 2
                     WHEN 'hold' THEN 3
                     ELSE 4
                   END) < ?
            "#,
        )
        .bind(phase.as_str())
        .bind(round_id)
        .bind(phase as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record an admin override. Refused when one exists or the winner is
    /// already computed.
    pub async fn set_manual_winner(
        &self,
        round_id: i64,
        winner: StoredDigit,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE rounds SET manual_winner = ?, is_manual_winner = 1
            WHERE id = ? AND status = 'running' AND is_manual_winner = 0
              AND calculated_winning_number IS NULL
            "#,
        )
        .bind(winner.as_i64())
        .bind(round_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Winning digits of the last `limit` completed rounds, oldest first.
    pub async fn recent_winners(&self, limit: i64) -> Result<Vec<StoredDigit>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT winning_number FROM rounds
            WHERE status = 'completed' AND winning_number IS NOT NULL
            ORDER BY round_number DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut winners = rows
            .iter()
            .map(|row| stored_digit(row.try_get("winning_number")?))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        winners.reverse();
        Ok(winners)
    }

    /// Apply a settlement plan in one transaction.
    ///
    /// The first statement flips the round from running to completed; if it
    /// matches nothing the round was already settled and nothing else is
    /// written.
    ///
    /// # Errors
    /// Any failure rolls the whole settlement back, leaving the round running.
    pub async fn commit_settlement(
        &self,
        round_id: i64,
        plan: &SettlementPlan,
        is_manual_winner: bool,
        settled_at: TimeMs,
    ) -> Result<SettlementCommit, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let guard = sqlx::query(
            r#"
            UPDATE rounds
            SET status = 'completed', phase = 'completed', winning_number = ?, end_time_ms = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(plan.winning_digit.to_stored().as_i64())
        .bind(settled_at.as_ms())
        .bind(round_id)
        .execute(&mut *tx)
        .await?;

        if guard.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(SettlementCommit::AlreadyCompleted);
        }

        if let Some(payout) = &plan.payout {
            let credited = sqlx::query(
                r#"
                UPDATE users SET pending_winning_coins = pending_winning_coins + ?
                WHERE id = ? AND pending_winning_coins <= ? - ?
                "#,
            )
            .bind(payout.reward)
            .bind(payout.user_id.as_str())
            .bind(i64::MAX)
            .bind(payout.reward)
            .execute(&mut *tx)
            .await?;
            if credited.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(SettlementCommit::PayoutRefused);
            }

            sqlx::query(
                r#"
                UPDATE bids SET result = 'win', reward = ?, is_manual_winner = ?
                WHERE id = ? AND round_id = ?
                "#,
            )
            .bind(payout.reward)
            .bind(is_manual_winner as i64)
            .bind(payout.bid_id)
            .bind(round_id)
            .execute(&mut *tx)
            .await?;
        }

        for bid_id in &plan.losing_bid_ids {
            sqlx::query("UPDATE bids SET result = 'lose', reward = 0 WHERE id = ? AND round_id = ?")
                .bind(bid_id)
                .bind(round_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(SettlementCommit::Committed)
    }
}
