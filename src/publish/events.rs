//! Outbound event payloads. Every digit here is in the public 0-9 space.

use serde::Serialize;

use crate::domain::{Digit, DigitCounts, Phase, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum GameEvent {
    NewRound(NewRound),
    ManualWinnerWindow(ManualWinnerWindow),
    PhaseChange(PhaseChange),
    TimerUpdate(TimerUpdate),
    ManualWinnerConfirmed(ManualWinnerConfirmed),
    ManualWinnerSet(ManualWinnerConfirmed),
    PlaySpin(PlaySpin),
    RoundResult(RoundResult),
    WinnerAnnounced(WinnerAnnounced),
    BalanceUpdate(BalanceUpdate),
    BidPlaced(BidPlaced),
}

impl GameEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::NewRound(_) => "newRound",
            GameEvent::ManualWinnerWindow(_) => "manualWinnerWindow",
            GameEvent::PhaseChange(_) => "phaseChange",
            GameEvent::TimerUpdate(_) => "timerUpdate",
            GameEvent::ManualWinnerConfirmed(_) => "manualWinnerConfirmed",
            GameEvent::ManualWinnerSet(_) => "manualWinnerSet",
            GameEvent::PlaySpin(_) => "playSpin",
            GameEvent::RoundResult(_) => "roundResult",
            GameEvent::WinnerAnnounced(_) => "winnerAnnounced",
            GameEvent::BalanceUpdate(_) => "balanceUpdate",
            GameEvent::BidPlaced(_) => "bidPlaced",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRound {
    pub round_number: i64,
    pub phase: Phase,
    pub time_left: i64,
    pub recent_winners: Vec<Digit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualWinnerWindow {
    pub round_number: i64,
    pub open: bool,
    pub duration_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseChange {
    pub round_number: i64,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_number: Option<Digit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdate {
    pub round_number: i64,
    pub phase: Phase,
    pub time_left: i64,
    pub visible_time_left: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualWinnerConfirmed {
    pub round_number: i64,
    pub winning_number: Digit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySpin {
    pub round_number: i64,
    pub winning_number: Digit,
    pub is_manual_winner: bool,
    pub total_bids: u32,
    pub participants: i64,
    pub digit_counts: DigitCounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub round_number: i64,
    pub winning_number: Digit,
    pub reward: i64,
    pub winner_user_id: Option<UserId>,
    pub is_manual_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerAnnounced {
    pub round_number: i64,
    pub winning_number: Digit,
    pub reward: i64,
    pub winner_user_id: Option<UserId>,
    pub total_bids: usize,
    pub total_coins_wagered: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceReason {
    BidPlaced,
    RoundWon,
    WinningsClaimed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    pub coins: i64,
    pub pending_winning_coins: i64,
    pub total_balance: i64,
    pub reason: BalanceReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPlaced {
    pub round_number: i64,
    pub digit_counts: DigitCounts,
    pub total_bids: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = GameEvent::PhaseChange(PhaseChange {
            round_number: 4,
            phase: Phase::Calculating,
            winning_number: None,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "phaseChange");
        assert_eq!(json["data"]["roundNumber"], 4);
        assert_eq!(json["data"]["phase"], "calculating");
        assert!(json["data"].get("winningNumber").is_none());
        assert_eq!(event.name(), "phaseChange");
    }

    #[test]
    fn test_winning_digit_zero_is_public_zero() {
        let event = GameEvent::ManualWinnerConfirmed(ManualWinnerConfirmed {
            round_number: 1,
            winning_number: Digit::ZERO,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["data"]["winningNumber"], 0);
    }

    #[test]
    fn test_balance_reason_tag() {
        let json = serde_json::to_value(BalanceReason::BidPlaced).unwrap();
        assert_eq!(json, "bid_placed");
    }
}
