//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by entity:
//! - `rounds.rs` - Round lifecycle, winner persistence, settlement commit
//! - `bids.rs` - Atomic bid placement and bid queries
//! - `users.rs` - Balances and winnings claims
//! - `settings.rs` - The singleton settings row

mod bids;
mod rounds;
mod settings;
mod users;

use crate::domain::{Bid, BidResult, Phase, Round, RoundStatus, StoredDigit, TimeMs, UserBalance, UserId};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;

pub use bids::PlacedBid;
pub use rounds::SettlementCommit;

/// Repository for database operations.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Cheap connectivity probe used by readiness checks.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn decode_err(msg: impl Into<String>) -> sqlx::Error {
    let msg: String = msg.into();
    sqlx::Error::Decode(msg.into())
}

fn stored_digit(value: Option<i64>) -> Result<Option<StoredDigit>, sqlx::Error> {
    value
        .map(|v| StoredDigit::from_stored(v).map_err(|e| decode_err(e.to_string())))
        .transpose()
}

pub(crate) const ROUND_COLUMNS: &str = r#"
    id, round_number, phase, status, bidding_locked, winning_number,
    calculated_winning_number, is_manual_winner, manual_winner,
    start_time_ms, end_time_ms
"#;

pub(crate) const BID_COLUMNS: &str = r#"
    id, round_id, user_id, bid_number, coins, result, reward,
    is_manual_winner, created_at_ms
"#;

fn round_from_row(row: &SqliteRow) -> Result<Round, sqlx::Error> {
    let phase: String = row.try_get("phase")?;
    let status: String = row.try_get("status")?;

    Ok(Round {
        id: row.try_get("id")?,
        round_number: row.try_get("round_number")?,
        phase: Phase::from_str(&phase).map_err(decode_err)?,
        status: RoundStatus::from_str(&status).map_err(decode_err)?,
        bidding_locked: row.try_get::<i64, _>("bidding_locked")? != 0,
        winning_number: stored_digit(row.try_get("winning_number")?)?,
        calculated_winning_number: stored_digit(row.try_get("calculated_winning_number")?)?,
        is_manual_winner: row.try_get::<i64, _>("is_manual_winner")? != 0,
        manual_winner: stored_digit(row.try_get("manual_winner")?)?,
        start_time: TimeMs::new(row.try_get("start_time_ms")?),
        end_time: row
            .try_get::<Option<i64>, _>("end_time_ms")?
            .map(TimeMs::new),
    })
}

fn bid_from_row(row: &SqliteRow) -> Result<Bid, sqlx::Error> {
    let result: String = row.try_get("result")?;
    let bid_number = stored_digit(Some(row.try_get("bid_number")?))?
        .ok_or_else(|| decode_err("bid_number is required"))?;

    Ok(Bid {
        id: row.try_get("id")?,
        round_id: row.try_get("round_id")?,
        user_id: UserId::new(row.try_get("user_id")?),
        bid_number,
        coins: row.try_get("coins")?,
        result: BidResult::from_str(&result).map_err(decode_err)?,
        reward: row.try_get("reward")?,
        is_manual_winner: row.try_get::<i64, _>("is_manual_winner")? != 0,
        created_at: TimeMs::new(row.try_get("created_at_ms")?),
    })
}

fn balance_from_row(row: &SqliteRow) -> Result<UserBalance, sqlx::Error> {
    Ok(UserBalance {
        user_id: UserId::new(row.try_get("id")?),
        coins: row.try_get("coins")?,
        pending_winning_coins: row.try_get("pending_winning_coins")?,
    })
}
