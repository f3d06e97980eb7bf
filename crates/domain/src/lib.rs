//! Domain layer for the merchant balance projections.
//!
//! This crate provides the pure parts of the balance projection:
//! - [`decode`] turns raw log entries into typed [`LedgerEvent`]s
//! - [`MerchantLedgerState`] is the per-merchant read model
//! - [`transition`] applies one event to one ledger and derives a [`BalanceChanged`] record
//!
//! Nothing here performs I/O.

pub mod error;
pub mod events;
pub mod ledger;

pub use error::{DecodeError, InvariantViolation};
pub use events::{
    EventKind, LedgerEvent, ManualDepositMade, MerchantCreated, MerchantFeeAdded,
    TransactionCompleted, TransactionStarted, decode, estate_key, merchant_key,
    parse_business_time,
};
pub use ledger::{
    BalanceChanged, BalanceReference, MerchantLedgerState, Outcome, Transition, transition,
};
