use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::auth::CurrentUser;
use super::AppState;
use crate::domain::UserBalance;
use crate::error::AppError;
use crate::orchestration::ClaimReceipt;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: String,
    pub coins: i64,
    pub pending_winning_coins: i64,
    pub total_balance: i64,
}

impl From<UserBalance> for BalanceResponse {
    fn from(balance: UserBalance) -> Self {
        Self {
            total_balance: balance.total(),
            user_id: balance.user_id.0,
            coins: balance.coins,
            pending_winning_coins: balance.pending_winning_coins,
        }
    }
}

pub async fn get_balance(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.accounts.balance(&user).await?;
    Ok(Json(balance.into()))
}

pub async fn claim_winnings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ClaimReceipt>, AppError> {
    let receipt = state.accounts.claim_winnings(&user).await?;
    Ok(Json(receipt))
}
