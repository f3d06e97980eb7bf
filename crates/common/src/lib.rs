//! Shared identifier types used across the projection crates.

pub mod types;

pub use types::{EstateId, MerchantId, TransactionId};
