use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::domain::{Digit, DigitCounts};

/// Which rule produced the winning digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WinnerSource {
    Manual,
    Unbid,
    LowestUnique,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub digit: Digit,
    pub source: WinnerSource,
}

/// Compute the winning digit for a round.
///
/// Rules, in order:
/// 1. An admin override wins outright.
/// 2. Any digit nobody bid on: chosen uniformly among all such digits.
/// 3. Any digit with exactly one bid: the lowest such digit.
/// 4. Otherwise 0.
pub fn resolve_winner<R: Rng + ?Sized>(
    counts: &DigitCounts,
    manual: Option<Digit>,
    rng: &mut R,
) -> Resolution {
    if let Some(digit) = manual {
        return Resolution {
            digit,
            source: WinnerSource::Manual,
        };
    }

    let unbid: Vec<Digit> = Digit::all().filter(|d| counts.get(d.index()) == 0).collect();
    if let Some(&digit) = unbid.choose(rng) {
        return Resolution {
            digit,
            source: WinnerSource::Unbid,
        };
    }

    if let Some(digit) = Digit::all().find(|d| counts.get(d.index()) == 1) {
        return Resolution {
            digit,
            source: WinnerSource::LowestUnique,
        };
    }

    Resolution {
        digit: Digit::ZERO,
        source: WinnerSource::Fallback,
    }
}
