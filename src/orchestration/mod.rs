//! Services that tie the store, the round engine, and the publisher together.

pub mod accounts;
pub mod driver;
pub mod gateway;
pub mod ledger;
pub mod timer;

pub use accounts::{AccountError, Accounts, ClaimReceipt};
pub use driver::{
    ManualWinnerAccepted, ManualWinnerError, RoundDriver, RoundSnapshot, TickOutcome, TimerError,
};
pub use gateway::{BidError, BidGateway, BidReceipt};
pub use ledger::{ResolvedWinner, RoundLedger, SettlementError, SettlementOutcome, SettlementReport};
pub use timer::{RoundTimer, TimerCommand, TimerHandle, TimerHealth};
