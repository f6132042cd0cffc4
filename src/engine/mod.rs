//! Pure computation for the round game: timeline, exactly-once action log,
//! winner resolution, and settlement planning.

pub mod clock;
pub mod resolver;
pub mod round_clock;
pub mod settlement;
pub mod timeline;

pub use clock::{Clock, ManualClock, SystemClock};
pub use resolver::{resolve_winner, Resolution, WinnerSource};
pub use round_clock::{ActionLog, RoundAction};
pub use settlement::{plan_settlement, Payout, PayoutOverflow, SettlementPlan};
pub use timeline::{ManualWindow, Timeline};
