use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::domain::{Bid, Digit, UserId};

/// The chosen bid's reward does not fit in an `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("payout for bid {bid_id} overflows: {coins} coins x {multiplier}")]
pub struct PayoutOverflow {
    pub bid_id: i64,
    pub coins: i64,
    pub multiplier: i64,
}

/// The single bid that gets paid for a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub bid_id: i64,
    pub user_id: UserId,
    pub reward: i64,
}

/// What settlement will write, computed before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub winning_digit: Digit,
    pub payout: Option<Payout>,
    pub losing_bid_ids: Vec<i64>,
}

impl SettlementPlan {
    pub fn reward(&self) -> i64 {
        self.payout.as_ref().map(|p| p.reward).unwrap_or(0)
    }
}

/// Pick exactly one matching bid at random and mark every other bid as losing.
///
/// Only one bid is ever paid per round, even when several users chose the
/// winning digit.
pub fn plan_settlement<R: Rng + ?Sized>(
    bids: &[Bid],
    winning_digit: Digit,
    multiplier: i64,
    rng: &mut R,
) -> Result<SettlementPlan, PayoutOverflow> {
    let matching: Vec<&Bid> = bids
        .iter()
        .filter(|b| b.bid_number.to_digit() == winning_digit)
        .collect();

    let payout = matching
        .choose(rng)
        .map(|bid| match bid.coins.checked_mul(multiplier) {
            Some(reward) => Ok(Payout {
                bid_id: bid.id,
                user_id: bid.user_id.clone(),
                reward,
            }),
            None => Err(PayoutOverflow {
                bid_id: bid.id,
                coins: bid.coins,
                multiplier,
            }),
        })
        .transpose()?;

    let paid_id = payout.as_ref().map(|p| p.bid_id);
    let losing_bid_ids = bids
        .iter()
        .filter(|b| Some(b.id) != paid_id)
        .map(|b| b.id)
        .collect();

    Ok(SettlementPlan {
        winning_digit,
        payout,
        losing_bid_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BidResult, StoredDigit, TimeMs};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn bid(id: i64, user: &str, digit: i64, coins: i64) -> Bid {
        Bid {
            id,
            round_id: 1,
            user_id: UserId::new(user.to_string()),
            bid_number: Digit::new(digit).unwrap().to_stored(),
            coins,
            result: BidResult::Pending,
            reward: None,
            is_manual_winner: false,
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_single_payout_among_matching_bids() {
        let bids = vec![
            bid(1, "a", 3, 50),
            bid(2, "b", 3, 20),
            bid(3, "c", 5, 30),
        ];
        let mut paid = HashSet::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_settlement(&bids, Digit::new(3).unwrap(), 10, &mut rng).unwrap();
            let payout = plan.payout.clone().expect("a matching bid must be paid");
            assert!(payout.bid_id == 1 || payout.bid_id == 2);
            let expected = if payout.bid_id == 1 { 500 } else { 200 };
            assert_eq!(payout.reward, expected);
            assert_eq!(plan.losing_bid_ids.len(), 2);
            assert!(!plan.losing_bid_ids.contains(&payout.bid_id));
            paid.insert(payout.bid_id);
        }
        assert_eq!(paid.len(), 2, "both matching bids should be reachable");
    }

    #[test]
    fn test_no_matching_bid_means_everyone_loses() {
        let bids = vec![bid(1, "a", 2, 50), bid(2, "b", 5, 30)];
        let mut rng = StdRng::seed_from_u64(0);
        let plan = plan_settlement(&bids, Digit::new(7).unwrap(), 10, &mut rng).unwrap();
        assert!(plan.payout.is_none());
        assert_eq!(plan.reward(), 0);
        assert_eq!(plan.losing_bid_ids, vec![1, 2]);
    }

    #[test]
    fn test_zero_digit_matches_stored_ten() {
        let bids = vec![bid(9, "a", 0, 5)];
        assert_eq!(bids[0].bid_number, StoredDigit::from_stored(10).unwrap());
        let mut rng = StdRng::seed_from_u64(0);
        let plan = plan_settlement(&bids, Digit::ZERO, 7, &mut rng).unwrap();
        assert_eq!(plan.reward(), 35);
        assert!(plan.losing_bid_ids.is_empty());
    }

    #[test]
    fn test_overflowing_reward_is_refused() {
        let bids = vec![bid(4, "a", 3, 2), bid(5, "b", 8, 1)];
        let mut rng = StdRng::seed_from_u64(0);
        let err = plan_settlement(&bids, Digit::new(3).unwrap(), i64::MAX, &mut rng).unwrap_err();
        assert_eq!(
            err,
            PayoutOverflow {
                bid_id: 4,
                coins: 2,
                multiplier: i64::MAX,
            }
        );

        // No matching bid means nothing to multiply.
        let plan = plan_settlement(&bids, Digit::new(9).unwrap(), i64::MAX, &mut rng).unwrap();
        assert!(plan.payout.is_none());
    }
}
