use serde::Serialize;

use crate::domain::Phase;

/// Phase boundaries of one round, in whole seconds elapsed since round start.
///
/// ```text
///  0 ............ 50 ...... 57 ..... 60 ........ 65 ..... 68
///  bidding        | override | calc   | playSpin  | hold   | settle + next
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    pub manual_window_open: i64,
    pub bidding_close: i64,
    pub spin_start: i64,
    pub hold_start: i64,
    pub round_end: i64,
    /// Length of the countdown shown to players; the rest of the round is hidden.
    pub visible_duration: i64,
}

/// Where the admin override window stands at a given elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManualWindow {
    TooEarly { wait_secs: i64 },
    Open { closes_in_secs: i64 },
    TooLate,
}

impl Timeline {
    pub const fn canonical() -> Self {
        Self {
            manual_window_open: 50,
            bidding_close: 57,
            spin_start: 60,
            hold_start: 65,
            round_end: 68,
            visible_duration: 60,
        }
    }

    /// Phase the round should be in at `elapsed`. Past `round_end` the round
    /// stays in hold until settlement completes it.
    pub fn phase_at(&self, elapsed: i64) -> Phase {
        if elapsed < self.bidding_close {
            Phase::Bidding
        } else if elapsed < self.spin_start {
            Phase::Calculating
        } else if elapsed < self.hold_start {
            Phase::PlaySpin
        } else {
            Phase::Hold
        }
    }

    /// Seconds until the current phase ends.
    pub fn phase_time_left(&self, elapsed: i64) -> i64 {
        let boundary = match self.phase_at(elapsed) {
            Phase::Bidding => self.bidding_close,
            Phase::Calculating => self.spin_start,
            Phase::PlaySpin => self.hold_start,
            Phase::Hold | Phase::Completed => self.round_end,
        };
        (boundary - elapsed).max(0)
    }

    pub fn visible_time_left(&self, elapsed: i64) -> i64 {
        (self.visible_duration - elapsed).max(0)
    }

    pub fn round_time_left(&self, elapsed: i64) -> i64 {
        (self.round_end - elapsed).max(0)
    }

    pub fn manual_window(&self, elapsed: i64) -> ManualWindow {
        if elapsed < self.manual_window_open {
            ManualWindow::TooEarly {
                wait_secs: self.manual_window_open - elapsed,
            }
        } else if elapsed < self.bidding_close {
            ManualWindow::Open {
                closes_in_secs: self.bidding_close - elapsed,
            }
        } else {
            ManualWindow::TooLate
        }
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::canonical()
    }
}
