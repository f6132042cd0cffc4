use crate::domain::{Digit, Phase, Round, RoundStatus, TimeMs};
use crate::engine::{ActionLog, Clock, ManualWindow, RoundAction, Timeline};
use crate::orchestration::ledger::{RoundLedger, SettlementError, SettlementOutcome};
use crate::publish::events::{
    ManualWinnerConfirmed, ManualWinnerWindow, NewRound, PhaseChange, PlaySpin, RoundResult,
    TimerUpdate, WinnerAnnounced,
};
use crate::publish::{BalanceReason, BalanceUpdate, Envelope, GameEvent};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// How many completed rounds a `newRound` event carries.
const RECENT_WINNERS_LIMIT: i64 = 10;

/// Drives one round at a time through its timeline.
///
/// The driver owns the in-memory view of the current round and the log of
/// actions already performed for it. It is not shared: the timer task holds
/// it and feeds it ticks and admin commands one at a time.
#[derive(Debug)]
pub struct RoundDriver {
    ledger: RoundLedger,
    clock: Arc<dyn Clock>,
    timeline: Timeline,
    current: Option<Round>,
    log: ActionLog,
    last_timer_update: Option<(i64, Phase, i64)>,
}

/// Events produced by one tick, plus the error that cut it short, if any.
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<Envelope>,
    pub error: Option<TimerError>,
}

/// Public view of the round the timer is driving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub round_number: i64,
    pub phase: Phase,
    pub time_left: i64,
    pub visible_time_left: i64,
    pub bidding_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_number: Option<Digit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualWinnerAccepted {
    pub round_number: i64,
    pub winning_number: Digit,
    pub elapsed_secs: i64,
    pub closes_in_secs: i64,
}

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("No round is being driven")]
    NoActiveRound,
    #[error("Round {0} has no resolved winner")]
    WinnerNotResolved(i64),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum ManualWinnerError {
    #[error("winningNumber must be between 0 and 9, got {0}")]
    InvalidDigit(i64),
    #[error("Manual winner selection is disabled")]
    Disabled,
    #[error("No active round running")]
    NoActiveRound,
    #[error("Manual winner already set for round {round_number}")]
    AlreadySet { round_number: i64 },
    #[error("Manual winner window opens in {wait_secs}s")]
    TooEarly {
        round_number: i64,
        wait_secs: i64,
        elapsed_secs: i64,
    },
    #[error("Manual winner window has closed for round {round_number}")]
    TooLate {
        round_number: i64,
        elapsed_secs: i64,
    },
    #[error("Round timer is not running")]
    TimerUnavailable,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl RoundDriver {
    pub fn new(ledger: RoundLedger, clock: Arc<dyn Clock>, timeline: Timeline) -> Self {
        Self {
            ledger,
            clock,
            timeline,
            current: None,
            log: ActionLog::new(0),
            last_timer_update: None,
        }
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.current.as_ref()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Pick up where the store left off: resume a running round, or open the
    /// round after the latest completed one.
    pub async fn bootstrap(&mut self) -> Result<Vec<Envelope>, TimerError> {
        let now = self.clock.now();
        match self.ledger.repo().latest_round().await? {
            Some(round) if round.is_running() => {
                tracing::info!(
                    round = %round.label(),
                    phase = %round.phase,
                    elapsed = round.elapsed_secs(now),
                    "resuming running round"
                );
                self.log = ActionLog::from_round(&round);
                self.current = Some(round);
                self.last_timer_update = None;
                Ok(Vec::new())
            }
            Some(round) => self.open_round(round.round_number + 1, now).await,
            None => self.open_round(1, now).await,
        }
    }

    /// Run every action that has come due, in timeline order.
    ///
    /// Stops at the first failure; the failed action stays pending and is
    /// retried on the next tick.
    pub async fn tick(&mut self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if self.current.is_none() {
            match self.bootstrap().await {
                Ok(events) => outcome.events.extend(events),
                Err(err) => {
                    outcome.error = Some(err);
                    return outcome;
                }
            }
        }

        let now = self.clock.now();
        let elapsed = match &self.current {
            Some(round) => round.elapsed_secs(now),
            None => return outcome,
        };

        for action in self.log.due(&self.timeline, elapsed) {
            match self.apply(action, now).await {
                Ok(events) => outcome.events.extend(events),
                Err(err) => {
                    tracing::error!(action = ?action, error = %err, "round action failed");
                    outcome.error = Some(err);
                    break;
                }
            }
            // Advance installs a fresh log for the next round.
            if action == RoundAction::Advance {
                break;
            }
            self.log.record(action);
        }

        if outcome.error.is_none() {
            if let Some(update) = self.timer_update(now) {
                outcome.events.push(update);
            }
        }
        outcome
    }

    /// Record an admin override for the current round.
    ///
    /// Accepted only inside the override window and before the winner has
    /// been resolved; at most once per round.
    pub async fn set_manual_winner(
        &mut self,
        digit: Digit,
    ) -> Result<ManualWinnerAccepted, ManualWinnerError> {
        let repo = self.ledger.repo().clone();
        if let Some(settings) = repo.get_settings().await? {
            if !settings.manual_winner_enabled {
                return Err(ManualWinnerError::Disabled);
            }
        }

        let round = self
            .current
            .clone()
            .filter(|r| r.is_running())
            .ok_or(ManualWinnerError::NoActiveRound)?;
        let round_number = round.round_number;
        if round.is_manual_winner {
            return Err(ManualWinnerError::AlreadySet { round_number });
        }

        let elapsed_secs = round.elapsed_secs(self.clock.now());
        if self.log.is_done(RoundAction::ResolveWinner) {
            return Err(ManualWinnerError::TooLate {
                round_number,
                elapsed_secs,
            });
        }

        let closes_in_secs = match self.timeline.manual_window(elapsed_secs) {
            ManualWindow::TooEarly { wait_secs } => {
                return Err(ManualWinnerError::TooEarly {
                    round_number,
                    wait_secs,
                    elapsed_secs,
                })
            }
            ManualWindow::TooLate => {
                return Err(ManualWinnerError::TooLate {
                    round_number,
                    elapsed_secs,
                })
            }
            ManualWindow::Open { closes_in_secs } => closes_in_secs,
        };

        if !repo.set_manual_winner(round.id, digit.to_stored()).await? {
            return Err(match repo.round_by_id(round.id).await? {
                Some(stored) if stored.is_manual_winner => {
                    ManualWinnerError::AlreadySet { round_number }
                }
                _ => ManualWinnerError::TooLate {
                    round_number,
                    elapsed_secs,
                },
            });
        }

        self.mirror(|r| {
            r.is_manual_winner = true;
            r.manual_winner = Some(digit.to_stored());
        });
        tracing::info!(
            round = %round.label(),
            digit = digit.value(),
            elapsed = elapsed_secs,
            "manual winner set"
        );

        Ok(ManualWinnerAccepted {
            round_number,
            winning_number: digit,
            elapsed_secs,
            closes_in_secs,
        })
    }

    pub fn snapshot(&self) -> Option<RoundSnapshot> {
        let round = self.current.as_ref()?;
        let elapsed = round.elapsed_secs(self.clock.now());
        let winning_number = match round.phase {
            Phase::PlaySpin | Phase::Hold => round.calculated_winning_number.map(|d| d.to_digit()),
            Phase::Completed => round.winning_number.map(|d| d.to_digit()),
            Phase::Bidding | Phase::Calculating => None,
        };
        Some(RoundSnapshot {
            round_number: round.round_number,
            phase: round.phase,
            time_left: self.timeline.phase_time_left(elapsed),
            visible_time_left: self.timeline.visible_time_left(elapsed),
            bidding_open: round.accepts_bids(),
            winning_number,
        })
    }

    async fn open_round(
        &mut self,
        round_number: i64,
        now: TimeMs,
    ) -> Result<Vec<Envelope>, TimerError> {
        let round = self.ledger.open_round(round_number, now).await?;
        let recent_winners = self.ledger.recent_winners(RECENT_WINNERS_LIMIT).await?;
        let elapsed = round.elapsed_secs(now);

        let event = GameEvent::NewRound(NewRound {
            round_number: round.round_number,
            phase: round.phase,
            time_left: self.timeline.phase_time_left(elapsed),
            recent_winners,
        });

        self.log = ActionLog::from_round(&round);
        self.current = Some(round);
        self.last_timer_update = None;
        Ok(vec![Envelope::to_all(event)])
    }

    async fn apply(&mut self, action: RoundAction, now: TimeMs) -> Result<Vec<Envelope>, TimerError> {
        let round = self.current.clone().ok_or(TimerError::NoActiveRound)?;
        let repo = self.ledger.repo().clone();
        let round_number = round.round_number;

        match action {
            RoundAction::OpenManualWindow => {
                // A restart or a stalled tick can land us past the window.
                if round.elapsed_secs(now) >= self.timeline.bidding_close {
                    tracing::debug!(round = %round.label(), "override window already over");
                    return Ok(Vec::new());
                }
                Ok(vec![Envelope::to_all(GameEvent::ManualWinnerWindow(
                    ManualWinnerWindow {
                        round_number,
                        open: true,
                        duration_secs: self.timeline.bidding_close
                            - self.timeline.manual_window_open,
                    },
                ))])
            }
            RoundAction::LockBidding => {
                repo.lock_bidding(round.id).await?;
                self.mirror(|r| {
                    r.bidding_locked = true;
                    if r.phase == Phase::Bidding {
                        r.phase = Phase::Calculating;
                    }
                });
                tracing::info!(round = %round.label(), "bidding locked");
                Ok(vec![Envelope::to_all(GameEvent::PhaseChange(PhaseChange {
                    round_number,
                    phase: Phase::Calculating,
                    winning_number: None,
                }))])
            }
            RoundAction::ResolveWinner => {
                let resolved = self.ledger.resolve_winner(&round).await?;
                self.mirror(|r| r.calculated_winning_number = Some(resolved.digit.to_stored()));
                if round.is_manual_winner {
                    Ok(vec![Envelope::to_all(GameEvent::ManualWinnerConfirmed(
                        ManualWinnerConfirmed {
                            round_number,
                            winning_number: resolved.digit,
                        },
                    ))])
                } else {
                    Ok(Vec::new())
                }
            }
            RoundAction::Announce => {
                let digit = calculated_winner(&round)?;
                repo.advance_phase(round.id, Phase::PlaySpin).await?;
                self.mirror(|r| r.phase = r.phase.max(Phase::PlaySpin));

                let digit_counts = repo.digit_counts(round.id).await?;
                let participants = repo.participant_count(round.id).await?;
                Ok(vec![Envelope::to_all(GameEvent::PlaySpin(PlaySpin {
                    round_number,
                    winning_number: digit,
                    is_manual_winner: round.is_manual_winner,
                    total_bids: digit_counts.total(),
                    participants,
                    digit_counts,
                }))])
            }
            RoundAction::EnterHold => {
                let digit = calculated_winner(&round)?;
                repo.advance_phase(round.id, Phase::Hold).await?;
                self.mirror(|r| r.phase = r.phase.max(Phase::Hold));
                Ok(vec![Envelope::to_all(GameEvent::PhaseChange(PhaseChange {
                    round_number,
                    phase: Phase::Hold,
                    winning_number: Some(digit),
                }))])
            }
            RoundAction::Settle => {
                let digit = calculated_winner(&round)?;
                let outcome = self.ledger.settle_round(&round, digit, now).await?;
                self.mirror(|r| {
                    r.status = RoundStatus::Completed;
                    r.phase = Phase::Completed;
                    r.winning_number = Some(digit.to_stored());
                    r.end_time = Some(now);
                });

                let report = match outcome {
                    SettlementOutcome::Settled(report) => report,
                    SettlementOutcome::AlreadySettled { .. } => {
                        tracing::warn!(round = %round.label(), "round was already settled");
                        return Ok(Vec::new());
                    }
                };

                let reward = report.plan.reward();
                let winner = report.plan.payout.as_ref().map(|p| p.user_id.clone());
                let mut events = vec![
                    Envelope::to_all(GameEvent::RoundResult(RoundResult {
                        round_number,
                        winning_number: digit,
                        reward,
                        winner_user_id: winner.clone(),
                        is_manual_winner: report.is_manual_winner,
                    })),
                    Envelope::to_all(GameEvent::WinnerAnnounced(WinnerAnnounced {
                        round_number,
                        winning_number: digit,
                        reward,
                        winner_user_id: winner.clone(),
                        total_bids: report.total_bids,
                        total_coins_wagered: report.total_coins_wagered,
                    })),
                ];
                if let (Some(user), Some(balance)) = (winner, report.winner_balance) {
                    events.push(Envelope::to_user(
                        user,
                        GameEvent::BalanceUpdate(BalanceUpdate {
                            coins: balance.coins,
                            pending_winning_coins: balance.pending_winning_coins,
                            total_balance: balance.total(),
                            reason: BalanceReason::RoundWon,
                            amount: Some(reward),
                        }),
                    ));
                }
                Ok(events)
            }
            RoundAction::Advance => self.open_round(round_number + 1, now).await,
        }
    }

    /// A `timerUpdate` for the current second, unless one was already sent.
    fn timer_update(&mut self, now: TimeMs) -> Option<Envelope> {
        let round = self.current.as_ref().filter(|r| r.is_running())?;
        let elapsed = round.elapsed_secs(now);
        let time_left = self.timeline.phase_time_left(elapsed);
        let key = (round.round_number, round.phase, time_left);
        if self.last_timer_update == Some(key) {
            return None;
        }

        let event = GameEvent::TimerUpdate(TimerUpdate {
            round_number: round.round_number,
            phase: round.phase,
            time_left,
            visible_time_left: self.timeline.visible_time_left(elapsed),
        });
        self.last_timer_update = Some(key);
        Some(Envelope::to_all(event))
    }

    fn mirror(&mut self, update: impl FnOnce(&mut Round)) {
        if let Some(round) = self.current.as_mut() {
            update(round);
        }
    }
}

fn calculated_winner(round: &Round) -> Result<Digit, TimerError> {
    round
        .calculated_winning_number
        .map(|d| d.to_digit())
        .ok_or(TimerError::WinnerNotResolved(round.round_number))
}
