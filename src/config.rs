use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{Settings, UserBalance};
use crate::engine::Timeline;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub starting_coins: i64,
    pub default_return_multiplier: i64,
    pub tick_interval_ms: u64,
    pub admin_token: Option<String>,
    pub timeline: Timeline,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let starting_coins = parse_non_negative(&env_map, "STARTING_COINS", "1000")?;
        if starting_coins > UserBalance::MAX_SEED_COINS {
            return Err(ConfigError::InvalidValue(
                "STARTING_COINS".to_string(),
                format!("must be at most {}", UserBalance::MAX_SEED_COINS),
            ));
        }

        let default_return_multiplier =
            parse_non_negative(&env_map, "DEFAULT_RETURN_MULTIPLIER", "10")?;
        if !Settings::valid_multiplier(default_return_multiplier) {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_RETURN_MULTIPLIER".to_string(),
                format!("must be between 1 and {}", Settings::MAX_RETURN_MULTIPLIER),
            ));
        }

        let tick_interval_ms = env_map
            .get("TICK_INTERVAL_MS")
            .map(|s| s.as_str())
            .unwrap_or("1000")
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "TICK_INTERVAL_MS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let admin_token = env_map
            .get("ADMIN_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Config {
            port,
            database_path,
            starting_coins,
            default_return_multiplier,
            tick_interval_ms,
            admin_token,
            timeline: Timeline::canonical(),
        })
    }
}

fn parse_non_negative(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<i64, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| {
            ConfigError::InvalidValue(key.to_string(), "must be a non-negative integer".to_string())
        })
}
