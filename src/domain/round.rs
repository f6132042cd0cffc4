use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::primitives::{StoredDigit, TimeMs};

/// Sub-state of a round. Ordering follows the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Bidding,
    Calculating,
    PlaySpin,
    Hold,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Bidding => "bidding",
            Phase::Calculating => "calculating",
            Phase::PlaySpin => "playSpin",
            Phase::Hold => "hold",
            Phase::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bidding" => Ok(Phase::Bidding),
            "calculating" => Ok(Phase::Calculating),
            "playSpin" => Ok(Phase::PlaySpin),
            "hold" => Ok(Phase::Hold),
            "completed" => Ok(Phase::Completed),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Running,
    Completed,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Running => "running",
            RoundStatus::Completed => "completed",
        }
    }
}

impl FromStr for RoundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RoundStatus::Running),
            "completed" => Ok(RoundStatus::Completed),
            other => Err(format!("unknown round status '{}'", other)),
        }
    }
}

/// One betting cycle, as persisted.
///
/// Digits on this struct are kept in their stored 1-10 form; callers convert
/// with [`StoredDigit::to_digit`] before exposing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub id: i64,
    pub round_number: i64,
    pub phase: Phase,
    pub status: RoundStatus,
    pub bidding_locked: bool,
    pub winning_number: Option<StoredDigit>,
    pub calculated_winning_number: Option<StoredDigit>,
    pub is_manual_winner: bool,
    pub manual_winner: Option<StoredDigit>,
    pub start_time: TimeMs,
    pub end_time: Option<TimeMs>,
}

impl Round {
    pub fn label(&self) -> String {
        format!("ROUND_{}", self.round_number)
    }

    pub fn is_running(&self) -> bool {
        self.status == RoundStatus::Running
    }

    /// Bids are admitted only while the round is running, in bidding, and unlocked.
    pub fn accepts_bids(&self) -> bool {
        self.is_running() && self.phase == Phase::Bidding && !self.bidding_locked
    }

    pub fn elapsed_secs(&self, now: TimeMs) -> i64 {
        now.whole_secs_since(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_round() -> Round {
        Round {
            id: 1,
            round_number: 7,
            phase: Phase::Bidding,
            status: RoundStatus::Running,
            bidding_locked: false,
            winning_number: None,
            calculated_winning_number: None,
            is_manual_winner: false,
            manual_winner: None,
            start_time: TimeMs::new(0),
            end_time: None,
        }
    }

    #[test]
    fn test_phase_round_trips_through_str() {
        for phase in [
            Phase::Bidding,
            Phase::Calculating,
            Phase::PlaySpin,
            Phase::Hold,
            Phase::Completed,
        ] {
            assert_eq!(Phase::from_str(phase.as_str()).unwrap(), phase);
        }
        assert!(Phase::from_str("spinning").is_err());
    }

    #[test]
    fn test_phase_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&Phase::PlaySpin).unwrap(),
            "\"playSpin\""
        );
    }

    #[test]
    fn test_phase_ordering_follows_lifecycle() {
        assert!(Phase::Bidding < Phase::Calculating);
        assert!(Phase::PlaySpin < Phase::Hold);
        assert!(Phase::Hold < Phase::Completed);
    }

    #[test]
    fn test_accepts_bids_requires_unlocked_bidding() {
        let mut round = running_round();
        assert!(round.accepts_bids());

        round.bidding_locked = true;
        assert!(!round.accepts_bids());

        round.bidding_locked = false;
        round.phase = Phase::Calculating;
        assert!(!round.accepts_bids());
    }

    #[test]
    fn test_label() {
        assert_eq!(running_round().label(), "ROUND_7");
    }
}
