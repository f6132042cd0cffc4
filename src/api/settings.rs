use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::auth::AdminAccess;
use super::AppState;
use crate::domain::Settings;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub global_return_multiplier: Option<i64>,
    pub manual_winner_enabled: Option<bool>,
}

fn defaults(state: &AppState) -> Settings {
    Settings {
        global_return_multiplier: state.config.default_return_multiplier,
        ..Settings::default()
    }
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    let settings = state.repo.get_or_init_settings(defaults(&state)).await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<Settings>, AppError> {
    if let Some(multiplier) = body.global_return_multiplier {
        if !Settings::valid_multiplier(multiplier) {
            return Err(AppError::bad_request(format!(
                "globalReturnMultiplier must be between 1 and {}, got {}",
                Settings::MAX_RETURN_MULTIPLIER,
                multiplier
            )));
        }
    }

    let settings = state
        .repo
        .update_settings(
            defaults(&state),
            body.global_return_multiplier,
            body.manual_winner_enabled,
        )
        .await?;
    tracing::info!(
        multiplier = settings.global_return_multiplier,
        manual_winner_enabled = settings.manual_winner_enabled,
        "settings updated"
    );
    Ok(Json(settings))
}
