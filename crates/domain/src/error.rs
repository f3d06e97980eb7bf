//! Domain error types.

use common::{EstateId, MerchantId, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a raw event cannot be turned into a [`crate::LedgerEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The event type is not one the ledger consumes. Not an error condition:
    /// the log carries many unrelated event types.
    #[error("Unrecognized event type: {0}")]
    UnrecognizedEventType(String),

    /// A required field is missing or has the wrong type.
    #[error("Malformed {event_type} event: {reason}")]
    MalformedEvent { event_type: String, reason: String },
}

impl DecodeError {
    /// Returns a short label suitable for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::UnrecognizedEventType(_) => "unrecognized",
            DecodeError::MalformedEvent { .. } => "malformed",
        }
    }
}

/// Anomalies the ledger tolerates while applying an event.
///
/// None of these stop processing: the ledger applies a best-effort correction,
/// or leaves the state untouched, and reports the violation so the driver can log it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// A transaction started with a negative amount; the reservation was clamped to zero.
    #[error("Transaction {transaction_id} reserved a negative amount {amount}; clamped to zero")]
    NegativeReservation {
        transaction_id: TransactionId,
        amount: Decimal,
    },

    /// A completion arrived for a transaction that has no reservation.
    #[error("Transaction {transaction_id} completed without a reservation; treated as zero")]
    UnmatchedCompletion { transaction_id: TransactionId },

    /// A repeated creation event disagrees with the recorded identity.
    #[error(
        "Merchant {merchant_id} re-created with estate {estate_id} and name {merchant_name:?}; identity kept"
    )]
    ConflictingIdentity {
        merchant_id: MerchantId,
        estate_id: EstateId,
        merchant_name: String,
    },

    /// Applying the amount would overflow a balance; the event was not applied.
    #[error("Merchant {merchant_id} balance would overflow applying {amount}; event not applied")]
    BalanceOverflow {
        merchant_id: MerchantId,
        amount: Decimal,
    },
}

impl InvariantViolation {
    /// Returns a short label suitable for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            InvariantViolation::NegativeReservation { .. } => "negative_reservation",
            InvariantViolation::UnmatchedCompletion { .. } => "unmatched_completion",
            InvariantViolation::ConflictingIdentity { .. } => "conflicting_identity",
            InvariantViolation::BalanceOverflow { .. } => "balance_overflow",
        }
    }
}
