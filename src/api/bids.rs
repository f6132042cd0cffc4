use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::auth::CurrentUser;
use super::AppState;
use crate::error::AppError;
use crate::orchestration::BidReceipt;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub bid_number: i64,
    pub amount: i64,
}

pub async fn place_bid(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<PlaceBidRequest>,
) -> Result<(StatusCode, Json<BidReceipt>), AppError> {
    let receipt = state
        .gateway
        .place_bid(&user, body.bid_number, body.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
