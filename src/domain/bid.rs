use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::primitives::{StoredDigit, TimeMs, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidResult {
    Pending,
    Win,
    Lose,
}

impl BidResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidResult::Pending => "pending",
            BidResult::Win => "win",
            BidResult::Lose => "lose",
        }
    }
}

impl FromStr for BidResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BidResult::Pending),
            "win" => Ok(BidResult::Win),
            "lose" => Ok(BidResult::Lose),
            other => Err(format!("unknown bid result '{}'", other)),
        }
    }
}

/// A single wager on one digit in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub id: i64,
    pub round_id: i64,
    pub user_id: UserId,
    pub bid_number: StoredDigit,
    pub coins: i64,
    pub result: BidResult,
    pub reward: Option<i64>,
    pub is_manual_winner: bool,
    pub created_at: TimeMs,
}

/// Per-digit bid counts, indexed by public digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DigitCounts(pub [u32; 10]);

impl DigitCounts {
    pub fn from_bids<'a>(bids: impl IntoIterator<Item = &'a Bid>) -> Self {
        let mut counts = [0u32; 10];
        for bid in bids {
            counts[bid.bid_number.to_digit().index()] += 1;
        }
        DigitCounts(counts)
    }

    pub fn get(&self, index: usize) -> u32 {
        self.0[index]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(stored: i64) -> Bid {
        Bid {
            id: 0,
            round_id: 1,
            user_id: UserId::new("u".to_string()),
            bid_number: StoredDigit::from_stored(stored).unwrap(),
            coins: 10,
            result: BidResult::Pending,
            reward: None,
            is_manual_winner: false,
            created_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_counts_translate_stored_ten_to_zero() {
        let bids = vec![bid(10), bid(10), bid(3)];
        let counts = DigitCounts::from_bids(&bids);
        assert_eq!(counts.get(0), 2);
        assert_eq!(counts.get(3), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_bid_result_parsing() {
        assert_eq!(BidResult::from_str("win").unwrap(), BidResult::Win);
        assert!(BidResult::from_str("draw").is_err());
    }
}
