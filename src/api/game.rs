use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::db::Repository;
use crate::domain::{Digit, DigitCounts, Phase, Round, RoundStatus, TimeMs};
use crate::engine::Timeline;
use crate::error::AppError;
use crate::orchestration::RoundSnapshot;

const RECENT_WINNERS_LIMIT: i64 = 10;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TimerResponse {
    Waiting,
    Running(RoundSnapshot),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    pub round_number: i64,
    pub label: String,
    pub phase: Phase,
    pub status: RoundStatus,
    pub bidding_locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_number: Option<Digit>,
    pub start_time_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time_ms: Option<i64>,
    pub time_left: i64,
    pub visible_time_left: i64,
    pub total_bids: u32,
    pub participants: i64,
    pub digit_counts: DigitCounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnersResponse {
    /// Oldest first.
    pub winners: Vec<Digit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

/// The winner is public only once the spin has started.
fn visible_winner(round: &Round) -> Option<Digit> {
    match round.phase {
        Phase::Completed => round.winning_number.map(|d| d.to_digit()),
        Phase::PlaySpin | Phase::Hold => round.calculated_winning_number.map(|d| d.to_digit()),
        Phase::Bidding | Phase::Calculating => None,
    }
}

async fn round_view(
    repo: &Repository,
    timeline: &Timeline,
    round: Round,
    now: TimeMs,
) -> Result<RoundView, AppError> {
    let digit_counts = repo.digit_counts(round.id).await?;
    let participants = repo.participant_count(round.id).await?;
    let (time_left, visible_time_left) = if round.is_running() {
        let elapsed = round.elapsed_secs(now);
        (
            timeline.phase_time_left(elapsed),
            timeline.visible_time_left(elapsed),
        )
    } else {
        (0, 0)
    };

    Ok(RoundView {
        round_number: round.round_number,
        label: round.label(),
        phase: round.phase,
        status: round.status,
        bidding_locked: round.bidding_locked,
        winning_number: visible_winner(&round),
        start_time_ms: round.start_time.as_ms(),
        end_time_ms: round.end_time.map(|t| t.as_ms()),
        time_left,
        visible_time_left,
        total_bids: digit_counts.total(),
        participants,
        digit_counts,
    })
}

pub async fn get_timer(State(state): State<AppState>) -> Json<TimerResponse> {
    Json(match state.timer.snapshot() {
        Some(snapshot) => TimerResponse::Running(snapshot),
        None => TimerResponse::Waiting,
    })
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let round = match state.repo.active_round().await? {
        Some(round) => round,
        None => {
            return Ok(Json(StatusResponse {
                status: "waiting",
                round: None,
            }))
        }
    };
    let view = round_view(&state.repo, &state.config.timeline, round, state.clock.now()).await?;
    Ok(Json(StatusResponse {
        status: "active",
        round: Some(view),
    }))
}

pub async fn get_winners(State(state): State<AppState>) -> Result<Json<WinnersResponse>, AppError> {
    let winners = state
        .repo
        .recent_winners(RECENT_WINNERS_LIMIT)
        .await?
        .into_iter()
        .map(|d| d.to_digit())
        .collect();
    let latest = state.repo.latest_round().await?;

    Ok(Json(WinnersResponse {
        winners,
        round_number: latest.as_ref().map(|r| r.round_number),
        phase: latest.as_ref().map(|r| r.phase),
    }))
}

pub async fn get_round(
    Path(round_number): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RoundView>, AppError> {
    let round = state
        .repo
        .round_by_number(round_number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("round {} not found", round_number)))?;
    let view = round_view(&state.repo, &state.config.timeline, round, state.clock.now()).await?;
    Ok(Json(view))
}
