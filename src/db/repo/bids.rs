//! Bid placement and bid queries for the repository.

use crate::domain::{Bid, BidResult, DigitCounts, StoredDigit, TimeMs, UserBalance, UserId};
use sqlx::Row;

use super::{balance_from_row, bid_from_row, Repository, BID_COLUMNS};

/// A committed bid together with the bidder's balance right after the deduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedBid {
    pub bid: Bid,
    pub balance: UserBalance,
}

impl Repository {
    /// Deduct `amount` and record the bid, only if the round still admits bids
    /// and the user can afford it.
    ///
    /// The lock check and the deduction are one statement, and that statement
    /// opens the write transaction, so a concurrent `lock_bidding` is ordered
    /// strictly before or after it. Returns `None` when nothing was written;
    /// the caller diagnoses why.
    pub async fn place_bid_atomic(
        &self,
        round_id: i64,
        user_id: &UserId,
        bid_number: StoredDigit,
        amount: i64,
        placed_at: TimeMs,
    ) -> Result<Option<PlacedBid>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let debit = sqlx::query(
            r#"
            UPDATE users SET coins = coins - ?
            WHERE id = ? AND coins >= ?
              AND EXISTS (
                  SELECT 1 FROM rounds
                  WHERE id = ? AND status = 'running' AND phase = 'bidding' AND bidding_locked = 0
              )
            "#,
        )
        .bind(amount)
        .bind(user_id.as_str())
        .bind(amount)
        .bind(round_id)
        .execute(&mut *tx)
        .await?;

        if debit.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO bids (round_id, user_id, bid_number, coins, result, is_manual_winner, created_at_ms)
            VALUES (?, ?, ?, ?, 'pending', 0, ?)
            "#,
        )
        .bind(round_id)
        .bind(user_id.as_str())
        .bind(bid_number.as_i64())
        .bind(amount)
        .bind(placed_at.as_ms())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT id, coins, pending_winning_coins FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_one(&mut *tx)
            .await?;
        let balance = balance_from_row(&row)?;

        tx.commit().await?;

        Ok(Some(PlacedBid {
            bid: Bid {
                id: inserted.last_insert_rowid(),
                round_id,
                user_id: user_id.clone(),
                bid_number,
                coins: amount,
                result: BidResult::Pending,
                reward: None,
                is_manual_winner: false,
                created_at: placed_at,
            },
            balance,
        }))
    }

    /// All bids of a round in placement order.
    pub async fn bids_for_round(&self, round_id: i64) -> Result<Vec<Bid>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM bids WHERE round_id = ? ORDER BY id ASC",
            BID_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(round_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(bid_from_row).collect()
    }

    pub async fn bid_by_id(&self, bid_id: i64) -> Result<Option<Bid>, sqlx::Error> {
        let sql = format!("SELECT {} FROM bids WHERE id = ?", BID_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(bid_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(bid_from_row).transpose()
    }

    /// Bid counts per public digit for a round.
    pub async fn digit_counts(&self, round_id: i64) -> Result<DigitCounts, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT bid_number, COUNT(*) AS n FROM bids WHERE round_id = ? GROUP BY bid_number",
        )
        .bind(round_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = DigitCounts::default();
        for row in rows {
            let stored: i64 = row.try_get("bid_number")?;
            let n: i64 = row.try_get("n")?;
            if let Ok(stored) = StoredDigit::from_stored(stored) {
                counts.0[stored.to_digit().index()] = n as u32;
            }
        }
        Ok(counts)
    }

    /// Number of distinct users with at least one bid in the round.
    pub async fn participant_count(&self, round_id: i64) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(DISTINCT user_id) AS n FROM bids WHERE round_id = ?")
            .bind(round_id)
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}
