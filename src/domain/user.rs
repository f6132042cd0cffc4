use serde::Serialize;

use super::primitives::UserId;

/// Balance pools for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBalance {
    #[serde(skip)]
    pub user_id: UserId,
    pub coins: i64,
    pub pending_winning_coins: i64,
}

impl UserBalance {
    /// Largest balance an admin may seed an account with.
    pub const MAX_SEED_COINS: i64 = 1_000_000_000;

    pub fn total(&self) -> i64 {
        self.coins.saturating_add(self.pending_winning_coins)
    }
}

/// Admin-controlled game settings (singleton).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub global_return_multiplier: i64,
    pub manual_winner_enabled: bool,
}

impl Settings {
    pub const DEFAULT_RETURN_MULTIPLIER: i64 = 10;
    pub const MAX_RETURN_MULTIPLIER: i64 = 1_000;

    pub fn valid_multiplier(multiplier: i64) -> bool {
        (1..=Self::MAX_RETURN_MULTIPLIER).contains(&multiplier)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_return_multiplier: Self::DEFAULT_RETURN_MULTIPLIER,
            manual_winner_enabled: true,
        }
    }
}
