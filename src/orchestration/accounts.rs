use crate::db::Repository;
use crate::domain::{UserBalance, UserId};
use crate::engine::Clock;
use crate::publish::{BalanceReason, BalanceUpdate, Envelope, GameEvent, Publisher};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// User balances: account seeding, lookups, and moving won coins into the
/// spendable pool.
#[derive(Debug, Clone)]
pub struct Accounts {
    repo: Arc<Repository>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    starting_coins: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReceipt {
    pub claimed: i64,
    pub coins: i64,
    pub pending_winning_coins: i64,
    pub total_balance: i64,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),
    #[error("User already exists: {0}")]
    AlreadyExists(UserId),
    #[error("Starting coins must be between 0 and 1000000000, got {0}")]
    InvalidAmount(i64),
    #[error("No pending winnings to claim")]
    NothingToClaim,
    #[error("Claiming {pending} would overflow a balance of {coins} coins")]
    BalanceOverflow { coins: i64, pending: i64 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Claims retry this many times when a settlement lands mid-claim.
const CLAIM_ATTEMPTS: usize = 3;

impl Accounts {
    pub fn new(
        repo: Arc<Repository>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
        starting_coins: i64,
    ) -> Self {
        Self {
            repo,
            publisher,
            clock,
            starting_coins,
        }
    }

    /// Create an account. A random id is assigned when none is given.
    pub async fn create_account(
        &self,
        user_id: Option<String>,
        coins: Option<i64>,
    ) -> Result<UserBalance, AccountError> {
        let coins = coins.unwrap_or(self.starting_coins);
        if !(0..=UserBalance::MAX_SEED_COINS).contains(&coins) {
            return Err(AccountError::InvalidAmount(coins));
        }
        let user_id = UserId::new(
            user_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        );

        if !self
            .repo
            .create_user(&user_id, coins, self.clock.now())
            .await?
        {
            return Err(AccountError::AlreadyExists(user_id));
        }
        tracing::info!(user = %user_id, coins, "account created");

        self.balance(&user_id).await
    }

    pub async fn balance(&self, user_id: &UserId) -> Result<UserBalance, AccountError> {
        self.repo
            .get_balance(user_id)
            .await?
            .ok_or_else(|| AccountError::UserNotFound(user_id.clone()))
    }

    /// Move every pending winning coin into the spendable balance.
    pub async fn claim_winnings(&self, user_id: &UserId) -> Result<ClaimReceipt, AccountError> {
        for _ in 0..CLAIM_ATTEMPTS {
            let current = self.balance(user_id).await?;
            let pending = current.pending_winning_coins;
            if pending <= 0 {
                return Err(AccountError::NothingToClaim);
            }
            if current.coins.checked_add(pending).is_none() {
                return Err(AccountError::BalanceOverflow {
                    coins: current.coins,
                    pending,
                });
            }
            if !self.repo.move_pending_to_coins(user_id, pending).await? {
                continue;
            }

            let balance = self.balance(user_id).await?;
            tracing::info!(user = %user_id, claimed = pending, "winnings claimed");
            self.publisher
                .publish(Envelope::to_user(
                    user_id.clone(),
                    GameEvent::BalanceUpdate(BalanceUpdate {
                        coins: balance.coins,
                        pending_winning_coins: balance.pending_winning_coins,
                        total_balance: balance.total(),
                        reason: BalanceReason::WinningsClaimed,
                        amount: Some(pending),
                    }),
                ))
                .await;

            return Ok(ClaimReceipt {
                claimed: pending,
                coins: balance.coins,
                pending_winning_coins: balance.pending_winning_coins,
                total_balance: balance.total(),
            });
        }
        Err(AccountError::NothingToClaim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_repo;
    use crate::db::repo::SettlementCommit;
    use crate::domain::{Digit, TimeMs};
    use crate::engine::{ManualClock, Payout, SettlementPlan};
    use crate::publish::RecordingPublisher;

    async fn setup() -> (Accounts, Arc<Repository>, RecordingPublisher, tempfile::TempDir) {
        let (repo, temp) = setup_repo().await;
        let recorder = RecordingPublisher::new();
        let accounts = Accounts::new(
            repo.clone(),
            Arc::new(recorder.clone()),
            Arc::new(ManualClock::new(TimeMs::new(0))),
            1000,
        );
        (accounts, repo, recorder, temp)
    }

    #[tokio::test]
    async fn test_create_account_defaults() {
        let (accounts, _repo, _recorder, _temp) = setup().await;
        let balance = accounts.create_account(None, None).await.unwrap();
        assert_eq!(balance.coins, 1000);
        assert_eq!(balance.pending_winning_coins, 0);
        assert!(!balance.user_id.as_str().is_empty());

        let named = accounts
            .create_account(Some("alice".to_string()), Some(50))
            .await
            .unwrap();
        assert_eq!(named.user_id.as_str(), "alice");
        assert_eq!(named.coins, 50);

        assert!(matches!(
            accounts.create_account(Some("alice".to_string()), None).await,
            Err(AccountError::AlreadyExists(_))
        ));
        assert!(matches!(
            accounts.create_account(None, Some(-1)).await,
            Err(AccountError::InvalidAmount(-1))
        ));
        assert!(matches!(
            accounts
                .create_account(None, Some(UserBalance::MAX_SEED_COINS + 1))
                .await,
            Err(AccountError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_claim_moves_pending_into_coins() {
        let (accounts, repo, recorder, _temp) = setup().await;
        let alice = accounts
            .create_account(Some("alice".to_string()), Some(100))
            .await
            .unwrap()
            .user_id;

        let round = repo.start_round(1, TimeMs::new(0)).await.unwrap();
        let placed = repo
            .place_bid_atomic(round.id, &alice, Digit::new(6).unwrap().to_stored(), 10, TimeMs::new(0))
            .await
            .unwrap()
            .unwrap();
        let plan = SettlementPlan {
            winning_digit: Digit::new(6).unwrap(),
            payout: Some(Payout {
                bid_id: placed.bid.id,
                user_id: alice.clone(),
                reward: 100,
            }),
            losing_bid_ids: vec![],
        };
        assert_eq!(
            repo.commit_settlement(round.id, &plan, false, TimeMs::new(1))
                .await
                .unwrap(),
            SettlementCommit::Committed
        );

        let receipt = accounts.claim_winnings(&alice).await.unwrap();
        assert_eq!(receipt.claimed, 100);
        assert_eq!(receipt.coins, 190);
        assert_eq!(receipt.pending_winning_coins, 0);
        assert_eq!(receipt.total_balance, 190);
        assert_eq!(recorder.names(), vec!["balanceUpdate"]);

        assert!(matches!(
            accounts.claim_winnings(&alice).await,
            Err(AccountError::NothingToClaim)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_balance() {
        let (accounts, _repo, _recorder, _temp) = setup().await;
        assert!(matches!(
            accounts.balance(&UserId::new("nobody".to_string())).await,
            Err(AccountError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_claim_refused_when_coins_would_overflow() {
        let (accounts, repo, recorder, _temp) = setup().await;
        let rich = UserId::new("rich".to_string());
        repo.create_user(&rich, i64::MAX - 1, TimeMs::new(0)).await.unwrap();
        let round = repo.start_round(1, TimeMs::new(0)).await.unwrap();
        let placed = repo
            .place_bid_atomic(round.id, &rich, Digit::new(2).unwrap().to_stored(), 1, TimeMs::new(0))
            .await
            .unwrap()
            .unwrap();
        let plan = SettlementPlan {
            winning_digit: Digit::new(2).unwrap(),
            payout: Some(Payout {
                bid_id: placed.bid.id,
                user_id: rich.clone(),
                reward: 5,
            }),
            losing_bid_ids: vec![],
        };
        repo.commit_settlement(round.id, &plan, false, TimeMs::new(1))
            .await
            .unwrap();

        assert!(matches!(
            accounts.claim_winnings(&rich).await,
            Err(AccountError::BalanceOverflow { pending: 5, .. })
        ));
        let balance = accounts.balance(&rich).await.unwrap();
        assert_eq!(balance.coins, i64::MAX - 2);
        assert_eq!(balance.pending_winning_coins, 5);
        assert!(recorder.names().is_empty());
    }
}
