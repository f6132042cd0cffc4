use std::collections::BTreeSet;

use crate::domain::{Phase, Round, RoundStatus};

use super::timeline::Timeline;

/// Side-effecting steps of a round, in the order they must happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RoundAction {
    OpenManualWindow,
    LockBidding,
    ResolveWinner,
    Announce,
    EnterHold,
    Settle,
    Advance,
}

impl RoundAction {
    pub const ALL: [RoundAction; 7] = [
        RoundAction::OpenManualWindow,
        RoundAction::LockBidding,
        RoundAction::ResolveWinner,
        RoundAction::Announce,
        RoundAction::EnterHold,
        RoundAction::Settle,
        RoundAction::Advance,
    ];

    /// Elapsed second at which this action becomes due.
    pub fn due_at(&self, timeline: &Timeline) -> i64 {
        match self {
            RoundAction::OpenManualWindow => timeline.manual_window_open,
            RoundAction::LockBidding | RoundAction::ResolveWinner => timeline.bidding_close,
            RoundAction::Announce => timeline.spin_start,
            RoundAction::EnterHold => timeline.hold_start,
            RoundAction::Settle | RoundAction::Advance => timeline.round_end,
        }
    }
}

/// Actions already performed for one round.
///
/// Consulted before every side effect so each runs at most once, whatever
/// the tick cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLog {
    round_number: i64,
    done: BTreeSet<RoundAction>,
}

impl ActionLog {
    pub fn new(round_number: i64) -> Self {
        Self {
            round_number,
            done: BTreeSet::new(),
        }
    }

    /// Rebuild the log for a round loaded from the store after a restart.
    ///
    /// Only persisted facts count. Announcements that left no trace are
    /// replayed, which is harmless.
    pub fn from_round(round: &Round) -> Self {
        let mut log = Self::new(round.round_number);
        if round.bidding_locked {
            log.record(RoundAction::OpenManualWindow);
            log.record(RoundAction::LockBidding);
        }
        if round.calculated_winning_number.is_some() {
            log.record(RoundAction::ResolveWinner);
        }
        if round.phase >= Phase::PlaySpin {
            log.record(RoundAction::Announce);
        }
        if round.phase >= Phase::Hold {
            log.record(RoundAction::EnterHold);
        }
        if round.status == RoundStatus::Completed {
            log.record(RoundAction::Settle);
        }
        log
    }

    pub fn round_number(&self) -> i64 {
        self.round_number
    }

    pub fn is_done(&self, action: RoundAction) -> bool {
        self.done.contains(&action)
    }

    pub fn record(&mut self, action: RoundAction) {
        self.done.insert(action);
    }

    /// Actions whose threshold `elapsed` has crossed and that have not run yet,
    /// in execution order.
    pub fn due(&self, timeline: &Timeline, elapsed: i64) -> Vec<RoundAction> {
        RoundAction::ALL
            .iter()
            .copied()
            .filter(|a| !self.is_done(*a) && elapsed >= a.due_at(timeline))
            .collect()
    }
}
