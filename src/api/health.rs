use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::AppState;
use crate::domain::TimeMs;
use crate::orchestration::TimerHealth;

/// Ticks the timer may miss before readiness fails.
const MISSED_TICKS_BEFORE_STALL: i64 = 5;
const MIN_SILENCE_MS: i64 = 5_000;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let database_ok = match state.repo.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "readiness database probe failed");
            false
        }
    };

    let max_silence_ms = (state.config.tick_interval_ms as i64)
        .saturating_mul(MISSED_TICKS_BEFORE_STALL)
        .max(MIN_SILENCE_MS);
    let timer = state.timer.health(TimeMs::now(), max_silence_ms);

    let ready = database_ok && timer != TimerHealth::Stalled;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "database": if database_ok { "ok" } else { "error" },
            "timer": timer,
        })),
    )
}
