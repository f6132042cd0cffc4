use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::auth::AdminAccess;
use super::users::BalanceResponse;
use super::AppState;
use crate::domain::Digit;
use crate::error::AppError;
use crate::orchestration::{ManualWinnerAccepted, ManualWinnerError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualWinnerRequest {
    pub winning_number: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub user_id: Option<String>,
    pub coins: Option<i64>,
}

pub async fn set_manual_winner(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(body): Json<ManualWinnerRequest>,
) -> Result<Json<ManualWinnerAccepted>, AppError> {
    let digit = Digit::new(body.winning_number)
        .map_err(|_| ManualWinnerError::InvalidDigit(body.winning_number))?;
    let accepted = state.timer.set_manual_winner(digit).await?;
    Ok(Json(accepted))
}

pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), AppError> {
    let balance = state
        .accounts
        .create_account(body.user_id, body.coins)
        .await?;
    Ok((StatusCode::CREATED, Json(balance.into())))
}
