pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod publish;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Bid, BidResult, Digit, Phase, Round, RoundStatus, Settings, StoredDigit, TimeMs, UserBalance,
    UserId,
};
pub use error::AppError;
