use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::orchestration::{AccountError, BidError, ManualWinnerError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String, Option<Value>),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String, Option<Value>),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into(), None)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error");
        AppError::Internal(err.to_string())
    }
}

impl From<BidError> for AppError {
    fn from(err: BidError) -> Self {
        let msg = err.to_string();
        match err {
            BidError::InvalidDigit(_) | BidError::InvalidAmount(_) => {
                AppError::BadRequest(msg, None)
            }
            BidError::NoActiveRound => AppError::BadRequest(msg, None),
            BidError::BiddingClosed {
                round_number,
                phase,
                bidding_locked,
            } => AppError::BadRequest(
                msg,
                Some(json!({
                    "roundNumber": round_number,
                    "phase": phase,
                    "biddingLocked": bidding_locked,
                })),
            ),
            BidError::InsufficientBalance {
                balance,
                requested,
                shortfall,
            } => AppError::BadRequest(
                msg,
                Some(json!({
                    "balance": balance,
                    "requested": requested,
                    "shortfall": shortfall,
                })),
            ),
            BidError::UserNotFound(_) => AppError::NotFound(msg),
            BidError::Conflict => AppError::Conflict(msg, None),
            BidError::Db(e) => e.into(),
        }
    }
}

impl From<ManualWinnerError> for AppError {
    fn from(err: ManualWinnerError) -> Self {
        let msg = err.to_string();
        match err {
            ManualWinnerError::InvalidDigit(_) => AppError::BadRequest(msg, None),
            ManualWinnerError::Disabled => AppError::Forbidden(msg),
            ManualWinnerError::NoActiveRound => AppError::BadRequest(msg, None),
            ManualWinnerError::AlreadySet { round_number } => {
                AppError::Conflict(msg, Some(json!({ "roundNumber": round_number })))
            }
            ManualWinnerError::TooEarly {
                round_number,
                wait_secs,
                elapsed_secs,
            } => AppError::BadRequest(
                msg,
                Some(json!({
                    "roundNumber": round_number,
                    "waitSecs": wait_secs,
                    "elapsedSecs": elapsed_secs,
                })),
            ),
            ManualWinnerError::TooLate {
                round_number,
                elapsed_secs,
            } => AppError::BadRequest(
                msg,
                Some(json!({
                    "roundNumber": round_number,
                    "elapsedSecs": elapsed_secs,
                })),
            ),
            ManualWinnerError::TimerUnavailable => AppError::Unavailable(msg),
            ManualWinnerError::Db(e) => e.into(),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        let msg = err.to_string();
        match err {
            AccountError::UserNotFound(_) => AppError::NotFound(msg),
            AccountError::AlreadyExists(_) => AppError::Conflict(msg, None),
            AccountError::InvalidAmount(_) | AccountError::NothingToClaim => {
                AppError::BadRequest(msg, None)
            }
            AccountError::BalanceOverflow { coins, pending } => AppError::Conflict(
                msg,
                Some(json!({
                    "coins": coins,
                    "pendingWinningCoins": pending,
                })),
            ),
            AccountError::Db(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::BadRequest(msg, details) => (StatusCode::BAD_REQUEST, msg, details),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::Conflict(msg, details) => (StatusCode::CONFLICT, msg, details),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
        };

        let mut body = json!({
            "error": error_message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
