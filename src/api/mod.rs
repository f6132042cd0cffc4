pub mod admin;
pub mod auth;
pub mod bids;
pub mod events;
pub mod game;
pub mod health;
pub mod settings;
pub mod users;

use crate::config::Config;
use crate::db::Repository;
use crate::engine::Clock;
use crate::orchestration::{Accounts, BidGateway, TimerHandle};
use crate::publish::EventHub;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub gateway: Arc<BidGateway>,
    pub accounts: Arc<Accounts>,
    pub timer: TimerHandle,
    pub events: EventHub,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        repo: Arc<Repository>,
        config: Config,
        gateway: Arc<BidGateway>,
        accounts: Arc<Accounts>,
        timer: TimerHandle,
        events: EventHub,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            config,
            gateway,
            accounts,
            timer,
            events,
            clock,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/game/timer", get(game::get_timer))
        .route("/v1/game/status", get(game::get_status))
        .route("/v1/game/winners", get(game::get_winners))
        .route("/v1/rounds/:round_number", get(game::get_round))
        .route("/v1/bids", post(bids::place_bid))
        .route("/v1/users/me/balance", get(users::get_balance))
        .route("/v1/users/me/claim", post(users::claim_winnings))
        .route("/v1/settings", get(settings::get_settings))
        .route("/v1/admin/settings", put(settings::update_settings))
        .route("/v1/admin/manual-winner", post(admin::set_manual_winner))
        .route("/v1/admin/users", post(admin::create_user))
        .route("/v1/events", get(events::stream_events))
        .layer(cors)
        .with_state(state)
}
