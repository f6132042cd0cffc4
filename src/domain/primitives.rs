//! Domain primitives: TimeMs, UserId, Digit, StoredDigit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Whole seconds elapsed from `start` to `self`, clamped at zero.
    pub fn whole_secs_since(&self, start: TimeMs) -> i64 {
        (self.0 - start.0).max(0) / 1000
    }
}

/// Opaque user identifier supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a UserId from a string.
    pub fn new(id: String) -> Self {
        UserId(id)
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigitError {
    #[error("digit must be between 0 and 9, got {0}")]
    OutOfRange(i64),
    #[error("stored digit must be between 1 and 10, got {0}")]
    StoredOutOfRange(i64),
}

/// A digit in the public 0-9 space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Digit(u8);

impl Digit {
    pub const ZERO: Digit = Digit(0);

    /// All ten digits in ascending order.
    pub fn all() -> impl Iterator<Item = Digit> {
        (0u8..=9).map(Digit)
    }

    pub fn new(value: i64) -> Result<Self, DigitError> {
        if (0..=9).contains(&value) {
            Ok(Digit(value as u8))
        } else {
            Err(DigitError::OutOfRange(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Persisted form: 0 is written as 10.
    pub fn to_stored(self) -> StoredDigit {
        if self.0 == 0 {
            StoredDigit(10)
        } else {
            StoredDigit(self.0)
        }
    }
}

impl TryFrom<i64> for Digit {
    type Error = DigitError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Digit::new(value)
    }
}

impl From<Digit> for i64 {
    fn from(d: Digit) -> Self {
        d.0 as i64
    }
}

impl std::fmt::Display for Digit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A digit as persisted in the 1-10 range, where 10 stands for 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoredDigit(u8);

impl StoredDigit {
    pub fn from_stored(value: i64) -> Result<Self, DigitError> {
        if (1..=10).contains(&value) {
            Ok(StoredDigit(value as u8))
        } else {
            Err(DigitError::StoredOutOfRange(value))
        }
    }

    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    pub fn to_digit(self) -> Digit {
        if self.0 == 10 {
            Digit(0)
        } else {
            Digit(self.0)
        }
    }
}
