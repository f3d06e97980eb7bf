//! The merchant balance ledger: state, derived events, and transition rules.

mod change;
mod machine;
mod state;

pub use change::{BalanceChanged, BalanceReference};
pub use machine::{Outcome, Transition, transition};
pub use state::{MerchantLedgerState, raise_watermark};
