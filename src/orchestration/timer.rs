use crate::domain::{Digit, TimeMs};
use crate::orchestration::driver::{ManualWinnerAccepted, ManualWinnerError, RoundDriver, RoundSnapshot};
use crate::publish::events::ManualWinnerConfirmed;
use crate::publish::{Envelope, GameEvent, Publisher, ADMIN_ROOM};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug)]
pub enum TimerCommand {
    SetManualWinner {
        digit: Digit,
        reply: oneshot::Sender<Result<ManualWinnerAccepted, ManualWinnerError>>,
    },
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerHealth {
    Starting,
    Running,
    Stalled,
}

/// Cheap, cloneable access to the running timer.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    commands: mpsc::Sender<TimerCommand>,
    snapshot: watch::Receiver<Option<RoundSnapshot>>,
    heartbeat: Arc<AtomicI64>,
}

impl TimerHandle {
    /// Route an override through the timer task so it is ordered against ticks.
    pub async fn set_manual_winner(
        &self,
        digit: Digit,
    ) -> Result<ManualWinnerAccepted, ManualWinnerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(TimerCommand::SetManualWinner { digit, reply })
            .await
            .map_err(|_| ManualWinnerError::TimerUnavailable)?;
        rx.await.map_err(|_| ManualWinnerError::TimerUnavailable)?
    }

    /// Round state as of the last tick.
    pub fn snapshot(&self) -> Option<RoundSnapshot> {
        self.snapshot.borrow().clone()
    }

    pub fn last_heartbeat(&self) -> Option<TimeMs> {
        match self.heartbeat.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(TimeMs::new(ms)),
        }
    }

    pub fn health(&self, now: TimeMs, max_silence_ms: i64) -> TimerHealth {
        if self.commands.is_closed() {
            return TimerHealth::Stalled;
        }
        match self.last_heartbeat() {
            None => TimerHealth::Starting,
            Some(at) if now.as_ms() - at.as_ms() > max_silence_ms => TimerHealth::Stalled,
            Some(_) => TimerHealth::Running,
        }
    }

    pub async fn shutdown(&self) {
        if self.commands.send(TimerCommand::Shutdown).await.is_err() {
            tracing::debug!("round timer already stopped");
        }
    }
}

struct TimerParts {
    driver: RoundDriver,
    commands: mpsc::Receiver<TimerCommand>,
    snapshot_tx: watch::Sender<Option<RoundSnapshot>>,
    publisher: Arc<dyn Publisher>,
    heartbeat: Arc<AtomicI64>,
}

/// Owns the periodic task that drives rounds. Only one task ever runs per
/// timer; a second `start` is ignored.
pub struct RoundTimer {
    running: AtomicBool,
    parts: Mutex<Option<TimerParts>>,
    handle: TimerHandle,
    tick_interval: Duration,
}

impl RoundTimer {
    pub fn new(driver: RoundDriver, publisher: Arc<dyn Publisher>, tick_interval: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let heartbeat = Arc::new(AtomicI64::new(0));

        Self {
            running: AtomicBool::new(false),
            parts: Mutex::new(Some(TimerParts {
                driver,
                commands: command_rx,
                snapshot_tx,
                publisher,
                heartbeat: heartbeat.clone(),
            })),
            handle: TimerHandle {
                commands: command_tx,
                snapshot: snapshot_rx,
                heartbeat,
            },
            tick_interval,
        }
    }

    pub fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the timer task. Returns `None` if it was already started.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("round timer already running; start ignored");
            return None;
        }
        let parts = match self.parts.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }?;
        Some(tokio::spawn(run(parts, self.tick_interval)))
    }
}

async fn run(mut parts: TimerParts, tick_interval: Duration) {
    tracing::info!(interval_ms = tick_interval.as_millis() as u64, "round timer started");

    match parts.driver.bootstrap().await {
        Ok(events) => parts.publisher.publish_all(events).await,
        Err(err) => tracing::error!(error = %err, "bootstrap failed; retrying on next tick"),
    }
    parts.snapshot_tx.send_replace(parts.driver.snapshot());

    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let outcome = parts.driver.tick().await;
                if let Some(err) = &outcome.error {
                    tracing::error!(error = %err, "tick failed; retrying on next tick");
                }
                parts.publisher.publish_all(outcome.events).await;
                parts.snapshot_tx.send_replace(parts.driver.snapshot());
                parts.heartbeat.store(TimeMs::now().as_ms(), Ordering::SeqCst);
            }
            command = parts.commands.recv() => match command {
                Some(TimerCommand::SetManualWinner { digit, reply }) => {
                    let result = parts.driver.set_manual_winner(digit).await;
                    if let Ok(accepted) = &result {
                        parts
                            .publisher
                            .publish(Envelope::to_room(
                                ADMIN_ROOM,
                                GameEvent::ManualWinnerSet(ManualWinnerConfirmed {
                                    round_number: accepted.round_number,
                                    winning_number: accepted.winning_number,
                                }),
                            ))
                            .await;
                    }
                    if reply.send(result).is_err() {
                        tracing::debug!("manual winner caller went away");
                    }
                }
                Some(TimerCommand::Shutdown) | None => {
                    tracing::info!("round timer stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_repo;
    use crate::engine::{ManualClock, Timeline};
    use crate::orchestration::ledger::RoundLedger;
    use crate::publish::RecordingPublisher;

    async fn build() -> (RoundTimer, ManualClock, RecordingPublisher, tempfile::TempDir) {
        let (repo, temp) = setup_repo().await;
        let clock = ManualClock::new(TimeMs::new(5_000_000));
        let driver = RoundDriver::new(
            RoundLedger::new(repo, 10),
            Arc::new(clock.clone()),
            Timeline::canonical(),
        );
        let recorder = RecordingPublisher::new();
        let timer = RoundTimer::new(driver, Arc::new(recorder.clone()), Duration::from_millis(10));
        (timer, clock, recorder, temp)
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (timer, _clock, _recorder, _temp) = build().await;
        let handle = timer.handle();
        let task = timer.start().expect("first start spawns");
        assert!(timer.start().is_none());
        assert!(timer.is_running());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_winner_routed_through_task() {
        let (timer, clock, recorder, _temp) = build().await;
        let handle = timer.handle();
        let task = timer.start().unwrap();

        let early = handle.set_manual_winner(Digit::new(8).unwrap()).await;
        assert!(matches!(early, Err(ManualWinnerError::TooEarly { .. })));

        clock.advance_secs(51);
        let accepted = handle.set_manual_winner(Digit::new(8).unwrap()).await.unwrap();
        assert_eq!(accepted.winning_number, Digit::new(8).unwrap());
        assert!(recorder.names().contains(&"manualWinnerSet"));

        handle.shutdown().await;
        task.await.unwrap();
        assert!(matches!(
            handle.set_manual_winner(Digit::new(1).unwrap()).await,
            Err(ManualWinnerError::TimerUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_snapshot_and_heartbeat_published() {
        let (timer, _clock, _recorder, _temp) = build().await;
        let handle = timer.handle();
        assert_eq!(handle.health(TimeMs::now(), 5_000), TimerHealth::Starting);
        let task = timer.start().unwrap();

        for _ in 0..100 {
            if handle.last_heartbeat().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handle.last_heartbeat().is_some());
        assert_eq!(handle.snapshot().unwrap().round_number, 1);
        assert_eq!(handle.health(TimeMs::now(), 5_000), TimerHealth::Running);

        handle.shutdown().await;
        task.await.unwrap();
        assert_eq!(handle.health(TimeMs::now(), 5_000), TimerHealth::Stalled);
    }
}
