use crate::db::repo::SettlementCommit;
use crate::db::Repository;
use crate::domain::{Digit, DigitCounts, Round, Settings, TimeMs, UserBalance};
use crate::engine::{plan_settlement, resolve_winner, PayoutOverflow, Resolution, SettlementPlan};
use std::sync::Arc;
use thiserror::Error;

/// Store-backed round operations: opening rounds, fixing the winner, and
/// settling. Every write here is guarded in the store so a repeat call is a
/// no-op rather than a double effect.
#[derive(Debug, Clone)]
pub struct RoundLedger {
    repo: Arc<Repository>,
    default_multiplier: i64,
}

/// Outcome of winner resolution for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWinner {
    /// The digit now persisted as the round's calculated winner.
    pub digit: Digit,
    pub resolution: Resolution,
    pub counts: DigitCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    pub round_number: i64,
    pub plan: SettlementPlan,
    pub is_manual_winner: bool,
    pub total_bids: usize,
    pub total_coins_wagered: i64,
    pub winner_balance: Option<UserBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled(SettlementReport),
    AlreadySettled { round_number: i64 },
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Round {0} not found")]
    RoundNotFound(i64),
    #[error(transparent)]
    PayoutOverflow(#[from] PayoutOverflow),
    #[error("Round {round_number} payout of {reward} refused by the store")]
    PayoutRefused { round_number: i64, reward: i64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl RoundLedger {
    pub fn new(repo: Arc<Repository>, default_multiplier: i64) -> Self {
        Self {
            repo,
            default_multiplier,
        }
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub async fn open_round(&self, round_number: i64, start: TimeMs) -> Result<Round, sqlx::Error> {
        let round = self.repo.start_round(round_number, start).await?;
        tracing::info!(round = %round.label(), "round opened");
        Ok(round)
    }

    /// Winning digits of recent completed rounds, oldest first.
    pub async fn recent_winners(&self, limit: i64) -> Result<Vec<Digit>, sqlx::Error> {
        let stored = self.repo.recent_winners(limit).await?;
        Ok(stored.into_iter().map(|d| d.to_digit()).collect())
    }

    /// Compute and persist the round's winner.
    ///
    /// If a winner was already persisted, that one is returned and the fresh
    /// computation is discarded.
    pub async fn resolve_winner(&self, round: &Round) -> Result<ResolvedWinner, sqlx::Error> {
        let counts = self.repo.digit_counts(round.id).await?;
        let manual = if round.is_manual_winner {
            round.manual_winner.map(|d| d.to_digit())
        } else {
            None
        };

        let resolution = {
            let mut rng = rand::thread_rng();
            resolve_winner(&counts, manual, &mut rng)
        };

        let stored = self
            .repo
            .record_calculated_winner(round.id, resolution.digit.to_stored())
            .await?;

        tracing::info!(
            round = %round.label(),
            winner = stored.to_digit().value(),
            source = ?resolution.source,
            total_bids = counts.total(),
            "winner resolved"
        );

        Ok(ResolvedWinner {
            digit: stored.to_digit(),
            resolution,
            counts,
        })
    }

    /// Pay the round and mark it completed, all in one store transaction.
    ///
    /// Safe to call more than once: the second call reports `AlreadySettled`
    /// and writes nothing.
    pub async fn settle_round(
        &self,
        round: &Round,
        winning_digit: Digit,
        settled_at: TimeMs,
    ) -> Result<SettlementOutcome, SettlementError> {
        let fresh = self
            .repo
            .round_by_id(round.id)
            .await?
            .ok_or(SettlementError::RoundNotFound(round.round_number))?;
        if !fresh.is_running() {
            return Ok(SettlementOutcome::AlreadySettled {
                round_number: fresh.round_number,
            });
        }

        let bids = self.repo.bids_for_round(fresh.id).await?;
        let multiplier = match self.repo.get_settings().await? {
            Some(settings) if Settings::valid_multiplier(settings.global_return_multiplier) => {
                settings.global_return_multiplier
            }
            Some(settings) => {
                tracing::warn!(
                    stored = settings.global_return_multiplier,
                    fallback = self.default_multiplier,
                    "stored multiplier out of range; using default"
                );
                self.default_multiplier
            }
            None => self.default_multiplier,
        };

        let plan = {
            let mut rng = rand::thread_rng();
            plan_settlement(&bids, winning_digit, multiplier, &mut rng)?
        };

        match self
            .repo
            .commit_settlement(fresh.id, &plan, fresh.is_manual_winner, settled_at)
            .await?
        {
            SettlementCommit::Committed => {}
            SettlementCommit::AlreadyCompleted => {
                tracing::warn!(round = %fresh.label(), "settlement raced; round already completed");
                return Ok(SettlementOutcome::AlreadySettled {
                    round_number: fresh.round_number,
                });
            }
            SettlementCommit::PayoutRefused => {
                tracing::error!(
                    round = %fresh.label(),
                    reward = plan.reward(),
                    paid_user = plan.payout.as_ref().map(|p| p.user_id.as_str()).unwrap_or("-"),
                    "pending balance cannot take the payout; settlement rolled back"
                );
                return Err(SettlementError::PayoutRefused {
                    round_number: fresh.round_number,
                    reward: plan.reward(),
                });
            }
        }

        let winner_balance = match &plan.payout {
            Some(payout) => self.repo.get_balance(&payout.user_id).await?,
            None => None,
        };

        tracing::info!(
            round = %fresh.label(),
            winner = winning_digit.value(),
            reward = plan.reward(),
            paid_user = plan.payout.as_ref().map(|p| p.user_id.as_str()).unwrap_or("-"),
            losing_bids = plan.losing_bid_ids.len(),
            "round settled"
        );

        Ok(SettlementOutcome::Settled(SettlementReport {
            round_number: fresh.round_number,
            is_manual_winner: fresh.is_manual_winner,
            total_bids: bids.len(),
            total_coins_wagered: bids.iter().map(|b| b.coins).sum(),
            winner_balance,
            plan,
        }))
    }
}
