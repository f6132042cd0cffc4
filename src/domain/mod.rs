//! Domain types for the digit round game.
//!
//! This module provides:
//! - Primitives: TimeMs, UserId, and the 0-9 / stored 1-10 digit pair
//! - Round and Bid entities with their lifecycle enums
//! - User balances and game settings

pub mod bid;
pub mod primitives;
pub mod round;
pub mod user;

pub use bid::{Bid, BidResult, DigitCounts};
pub use primitives::{Digit, DigitError, StoredDigit, TimeMs, UserId};
pub use round::{Phase, Round, RoundStatus};
pub use user::{Settings, UserBalance};
