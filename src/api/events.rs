//! Server-sent event stream of game events.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

use super::auth::{AdminAccess, CurrentUser};
use super::AppState;
use crate::error::AppError;
use crate::publish::hub::Subscription;
use crate::publish::ADMIN_ROOM;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Must match the caller's `X-User-Id` when given.
    pub user: Option<String>,
    pub room: Option<String>,
    /// Required to join the admin room; browsers cannot set headers on EventSource.
    pub token: Option<String>,
}

pub async fn stream_events(
    State(state): State<AppState>,
    caller: Option<CurrentUser>,
    Query(params): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let user = CurrentUser::stream_scope(caller.as_ref(), params.user.as_deref())?;
    let rooms: Vec<String> = params
        .room
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect();
    if rooms.iter().any(|r| r == ADMIN_ROOM) {
        AdminAccess::verify(state.config.admin_token.as_deref(), params.token.as_deref())?;
    }

    let subscription = Subscription { user, rooms };
    tracing::debug!(?subscription, "event stream opened");

    let rx = state.events.subscribe();
    let stream = stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if !subscription.wants(&envelope.audience) {
                        continue;
                    }
                    match Event::default()
                        .event(envelope.event.name())
                        .json_data(&envelope.event)
                    {
                        Ok(event) => return Some((Ok(event), (rx, subscription))),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to encode event");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
