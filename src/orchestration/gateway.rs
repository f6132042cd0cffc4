use crate::db::Repository;
use crate::domain::{Digit, Phase, UserId};
use crate::engine::Clock;
use crate::publish::events::BidPlaced;
use crate::publish::{BalanceReason, BalanceUpdate, Envelope, GameEvent, Publisher};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Admits bids against the running round.
#[derive(Debug, Clone)]
pub struct BidGateway {
    repo: Arc<Repository>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidReceipt {
    pub bid_id: i64,
    pub round_number: i64,
    pub bid_number: Digit,
    pub amount: i64,
    pub coins: i64,
    pub pending_winning_coins: i64,
    pub total_balance: i64,
}

#[derive(Debug, Error)]
pub enum BidError {
    #[error("bidNumber must be between 0 and 9, got {0}")]
    InvalidDigit(i64),
    #[error("amount must be greater than 0, got {0}")]
    InvalidAmount(i64),
    #[error("No active round running")]
    NoActiveRound,
    #[error("Bidding is closed for round {round_number} (phase {phase})")]
    BiddingClosed {
        round_number: i64,
        phase: Phase,
        bidding_locked: bool,
    },
    #[error("Insufficient coins: have {balance}, need {requested}")]
    InsufficientBalance {
        balance: i64,
        requested: i64,
        shortfall: i64,
    },
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    #[error("Bid conflicts with concurrent state; retry")]
    Conflict,
    #[error(transparent)]
    Db(sqlx::Error),
}

impl From<sqlx::Error> for BidError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => BidError::Conflict,
            _ => BidError::Db(err),
        }
    }
}

impl BidGateway {
    pub fn new(repo: Arc<Repository>, publisher: Arc<dyn Publisher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            publisher,
            clock,
        }
    }

    /// Validate and record a bid, debiting the user in the same transaction.
    ///
    /// The round's lock flag is the only admission authority. A rejected bid
    /// leaves balances untouched.
    pub async fn place_bid(
        &self,
        user_id: &UserId,
        bid_number: i64,
        amount: i64,
    ) -> Result<BidReceipt, BidError> {
        let digit = Digit::new(bid_number).map_err(|_| BidError::InvalidDigit(bid_number))?;
        if amount <= 0 {
            return Err(BidError::InvalidAmount(amount));
        }

        let round = self
            .repo
            .active_round()
            .await?
            .ok_or(BidError::NoActiveRound)?;
        if !round.accepts_bids() {
            return Err(BidError::BiddingClosed {
                round_number: round.round_number,
                phase: round.phase,
                bidding_locked: round.bidding_locked,
            });
        }

        let placed = self
            .repo
            .place_bid_atomic(round.id, user_id, digit.to_stored(), amount, self.clock.now())
            .await?;
        let placed = match placed {
            Some(placed) => placed,
            None => return Err(self.diagnose_rejection(round.id, user_id, amount).await?),
        };

        tracing::info!(
            round = %round.label(),
            user = %user_id,
            digit = digit.value(),
            amount,
            "bid placed"
        );

        let counts = self.repo.digit_counts(round.id).await?;
        let balance = placed.balance;
        self.publisher
            .publish_all(vec![
                Envelope::to_user(
                    user_id.clone(),
                    GameEvent::BalanceUpdate(BalanceUpdate {
                        coins: balance.coins,
                        pending_winning_coins: balance.pending_winning_coins,
                        total_balance: balance.total(),
                        reason: BalanceReason::BidPlaced,
                        amount: Some(amount),
                    }),
                ),
                Envelope::to_all(GameEvent::BidPlaced(BidPlaced {
                    round_number: round.round_number,
                    total_bids: counts.total(),
                    digit_counts: counts,
                })),
            ])
            .await;

        Ok(BidReceipt {
            bid_id: placed.bid.id,
            round_number: round.round_number,
            bid_number: digit,
            amount,
            coins: balance.coins,
            pending_winning_coins: balance.pending_winning_coins,
            total_balance: balance.total(),
        })
    }

    /// Work out why the atomic admission wrote nothing.
    async fn diagnose_rejection(
        &self,
        round_id: i64,
        user_id: &UserId,
        amount: i64,
    ) -> Result<BidError, BidError> {
        match self.repo.round_by_id(round_id).await? {
            Some(round) if !round.accepts_bids() => {
                return Ok(BidError::BiddingClosed {
                    round_number: round.round_number,
                    phase: round.phase,
                    bidding_locked: round.bidding_locked,
                })
            }
            None => return Ok(BidError::NoActiveRound),
            Some(_) => {}
        }

        let balance = self
            .repo
            .get_balance(user_id)
            .await?
            .ok_or_else(|| BidError::UserNotFound(user_id.clone()))?;
        if balance.coins < amount {
            return Ok(BidError::InsufficientBalance {
                balance: balance.coins,
                requested: amount,
                shortfall: amount - balance.coins,
            });
        }

        tracing::warn!(user = %user_id, amount, "bid rejected but state now admits it");
        Ok(BidError::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_repo;
    use crate::domain::TimeMs;
    use crate::engine::ManualClock;
    use crate::publish::{Audience, RecordingPublisher};

    async fn setup() -> (BidGateway, Arc<Repository>, RecordingPublisher, tempfile::TempDir) {
        let (repo, temp) = setup_repo().await;
        let recorder = RecordingPublisher::new();
        let gateway = BidGateway::new(
            repo.clone(),
            Arc::new(recorder.clone()),
            Arc::new(ManualClock::new(TimeMs::new(1_000))),
        );
        (gateway, repo, recorder, temp)
    }

    #[tokio::test]
    async fn test_place_bid_publishes_balance_and_counts() {
        let (gateway, repo, recorder, _temp) = setup().await;
        let alice = UserId::new("alice".to_string());
        repo.create_user(&alice, 1000, TimeMs::new(0)).await.unwrap();
        repo.start_round(1, TimeMs::new(0)).await.unwrap();

        let receipt = gateway.place_bid(&alice, 0, 250).await.unwrap();
        assert_eq!(receipt.round_number, 1);
        assert_eq!(receipt.bid_number, Digit::ZERO);
        assert_eq!(receipt.coins, 750);
        assert_eq!(receipt.total_balance, 750);

        let envelopes = recorder.envelopes();
        assert_eq!(recorder.names(), vec!["balanceUpdate", "bidPlaced"]);
        assert_eq!(envelopes[0].audience, Audience::User(alice));
        match &envelopes[1].event {
            GameEvent::BidPlaced(placed) => {
                assert_eq!(placed.digit_counts.get(0), 1);
                assert_eq!(placed.total_bids, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (gateway, repo, _recorder, _temp) = setup().await;
        let alice = UserId::new("alice".to_string());
        repo.create_user(&alice, 1000, TimeMs::new(0)).await.unwrap();

        assert!(matches!(
            gateway.place_bid(&alice, 10, 5).await,
            Err(BidError::InvalidDigit(10))
        ));
        assert!(matches!(
            gateway.place_bid(&alice, -1, 5).await,
            Err(BidError::InvalidDigit(-1))
        ));
        assert!(matches!(
            gateway.place_bid(&alice, 3, 0).await,
            Err(BidError::InvalidAmount(0))
        ));
        assert!(matches!(
            gateway.place_bid(&alice, 3, 5).await,
            Err(BidError::NoActiveRound)
        ));
    }

    #[tokio::test]
    async fn test_rejected_after_lock_keeps_balance() {
        let (gateway, repo, recorder, _temp) = setup().await;
        let alice = UserId::new("alice".to_string());
        repo.create_user(&alice, 1000, TimeMs::new(0)).await.unwrap();
        let round = repo.start_round(1, TimeMs::new(0)).await.unwrap();
        repo.lock_bidding(round.id).await.unwrap();

        match gateway.place_bid(&alice, 4, 100).await {
            Err(BidError::BiddingClosed {
                round_number,
                phase,
                bidding_locked,
            }) => {
                assert_eq!(round_number, 1);
                assert_eq!(phase, Phase::Calculating);
                assert!(bidding_locked);
            }
            other => panic!("expected BiddingClosed, got {:?}", other),
        }
        assert_eq!(repo.get_balance(&alice).await.unwrap().unwrap().coins, 1000);
        assert!(recorder.envelopes().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_reports_shortfall() {
        let (gateway, repo, _recorder, _temp) = setup().await;
        let bob = UserId::new("bob".to_string());
        repo.create_user(&bob, 30, TimeMs::new(0)).await.unwrap();
        repo.start_round(1, TimeMs::new(0)).await.unwrap();

        match gateway.place_bid(&bob, 1, 50).await {
            Err(BidError::InsufficientBalance {
                balance,
                requested,
                shortfall,
            }) => {
                assert_eq!(balance, 30);
                assert_eq!(requested, 50);
                assert_eq!(shortfall, 20);
            }
            other => panic!("expected InsufficientBalance, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (gateway, repo, _recorder, _temp) = setup().await;
        repo.start_round(1, TimeMs::new(0)).await.unwrap();
        let ghost = UserId::new("ghost".to_string());
        assert!(matches!(
            gateway.place_bid(&ghost, 1, 5).await,
            Err(BidError::UserNotFound(_))
        ));
    }
}
