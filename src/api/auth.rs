//! Request identity. User ids come from an upstream auth layer via header;
//! admin calls carry the shared admin token.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::AppState;
use crate::domain::UserId;
use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing X-User-Id header".to_string()))?;
        Ok(CurrentUser(UserId::new(id.to_string())))
    }
}

impl CurrentUser {
    /// The user whose private events a stream may carry.
    ///
    /// A `requested` id must be the caller's own; with none requested the
    /// caller's identity is used, if any.
    pub fn stream_scope(
        caller: Option<&CurrentUser>,
        requested: Option<&str>,
    ) -> Result<Option<UserId>, AppError> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        match (caller, requested) {
            (caller, None) => Ok(caller.map(|c| c.0.clone())),
            (None, Some(_)) => Err(AppError::Unauthorized(
                "missing X-User-Id header".to_string(),
            )),
            (Some(CurrentUser(id)), Some(requested)) if id.as_str() == requested => {
                Ok(Some(id.clone()))
            }
            (Some(_), Some(_)) => Err(AppError::Forbidden(
                "cannot follow another user's events".to_string(),
            )),
        }
    }
}

/// Proof that the request carried the admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl AdminAccess {
    /// Check a presented token against the configured one.
    pub fn verify(configured: Option<&str>, presented: Option<&str>) -> Result<Self, AppError> {
        let expected = configured
            .ok_or_else(|| AppError::Forbidden("admin access is not configured".to_string()))?;
        match presented {
            Some(token) if token == expected => Ok(AdminAccess),
            _ => Err(AppError::Unauthorized("invalid admin token".to_string())),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        AdminAccess::verify(state.config.admin_token.as_deref(), presented)
    }
}
