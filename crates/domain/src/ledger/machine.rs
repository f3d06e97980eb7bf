//! Ledger state machine.
//!
//! ```text
//!               MerchantCreated
//!   (absent) ─────────────────────► Active ◄──┐ ManualDepositMade / MerchantFeeAdded
//!      │                              │  └────┘ TransactionStarted / TransactionCompleted
//!      └─ any other event: ignored    └─ MerchantCreated again: replayed, state kept
//! ```
//!
//! [`transition`] is a pure function: the same state and event always yield
//! the same result, so replaying the log from the start reproduces the ledger.

use rust_decimal::Decimal;

use crate::error::InvariantViolation;
use crate::events::{
    LedgerEvent, ManualDepositMade, MerchantCreated, MerchantFeeAdded, TransactionCompleted,
    TransactionStarted,
};

use super::{BalanceChanged, BalanceReference, MerchantLedgerState, raise_watermark};

/// What applying an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A merchant was created.
    Created,
    /// A creation event arrived for a merchant that already exists.
    Replayed,
    /// The event was applied to an existing merchant.
    Applied,
    /// The event refers to a merchant with no creation event yet; ignored.
    UnknownMerchant,
    /// Applying the event would overflow a balance; the ledger was left unchanged.
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Replayed => "replayed",
            Outcome::Applied => "applied",
            Outcome::UnknownMerchant => "unknown_merchant",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Result of applying one event to one merchant's ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The next state; `None` only when the merchant is still unknown.
    pub state: Option<MerchantLedgerState>,
    /// The derived balance-change event, if the step produced one.
    pub change: Option<BalanceChanged>,
    pub outcome: Outcome,
    /// Anomalies tolerated while applying the event.
    pub violations: Vec<InvariantViolation>,
}

impl Transition {
    fn emit(state: MerchantLedgerState, change_amount: Decimal, reference: BalanceReference) -> Self {
        let change = BalanceChanged::from_state(&state, change_amount, reference);
        Self {
            state: Some(state),
            change: Some(change),
            outcome: Outcome::Applied,
            violations: Vec::new(),
        }
    }

    fn unknown_merchant() -> Self {
        Self {
            state: None,
            change: None,
            outcome: Outcome::UnknownMerchant,
            violations: Vec::new(),
        }
    }

    fn overflow(state: MerchantLedgerState, amount: Decimal) -> Self {
        let violation = InvariantViolation::BalanceOverflow {
            merchant_id: state.merchant_id.clone(),
            amount,
        };
        Self {
            state: Some(state),
            change: None,
            outcome: Outcome::Rejected,
            violations: vec![violation],
        }
    }

    fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    fn with_violation(mut self, violation: Option<InvariantViolation>) -> Self {
        self.violations.extend(violation);
        self
    }
}

/// Computes the next ledger state for a merchant from its current state and an event.
pub fn transition(current: Option<MerchantLedgerState>, event: &LedgerEvent) -> Transition {
    match (event, current) {
        (LedgerEvent::MerchantCreated(created), current) => merchant_created(current, created),
        (_, None) => Transition::unknown_merchant(),
        (LedgerEvent::ManualDepositMade(deposit), Some(state)) => deposit_made(state, deposit),
        (LedgerEvent::TransactionStarted(started), Some(state)) => {
            transaction_started(state, started)
        }
        (LedgerEvent::TransactionCompleted(completed), Some(state)) => {
            transaction_completed(state, completed)
        }
        (LedgerEvent::MerchantFeeAdded(fee), Some(state)) => fee_added(state, fee),
    }
}

fn merchant_created(current: Option<MerchantLedgerState>, event: &MerchantCreated) -> Transition {
    match current {
        None => {
            let state = MerchantLedgerState::new(
                event.estate_id.clone(),
                event.merchant_id.clone(),
                event.merchant_name.clone(),
            );
            Transition::emit(state, Decimal::ZERO, BalanceReference::MerchantCreated)
                .with_outcome(Outcome::Created)
        }
        Some(state) => {
            let conflict = (state.estate_id != event.estate_id
                || state.merchant_name != event.merchant_name)
                .then(|| InvariantViolation::ConflictingIdentity {
                    merchant_id: event.merchant_id.clone(),
                    estate_id: event.estate_id.clone(),
                    merchant_name: event.merchant_name.clone(),
                });
            Transition::emit(state, Decimal::ZERO, BalanceReference::MerchantCreated)
                .with_outcome(Outcome::Replayed)
                .with_violation(conflict)
        }
    }
}

fn deposit_made(mut state: MerchantLedgerState, event: &ManualDepositMade) -> Transition {
    let (Some(balance), Some(available)) = (
        state.balance.checked_add(event.amount),
        state.available_balance.checked_add(event.amount),
    ) else {
        return Transition::overflow(state, event.amount);
    };
    state.balance = balance;
    state.available_balance = available;
    raise_watermark(&mut state.last_deposit_date_time, event.deposit_date_time);
    Transition::emit(state, event.amount, BalanceReference::MerchantDeposit)
}

fn transaction_started(mut state: MerchantLedgerState, event: &TransactionStarted) -> Transition {
    let (amount, violation) = if event.transaction_amount.is_sign_negative() {
        let violation = InvariantViolation::NegativeReservation {
            transaction_id: event.transaction_id.clone(),
            amount: event.transaction_amount,
        };
        (Decimal::ZERO, Some(violation))
    } else {
        (event.transaction_amount, None)
    };

    // A restart replaces the earlier reservation rather than stacking on it.
    let previous = state
        .in_flight_transactions
        .get(&event.transaction_id)
        .copied()
        .unwrap_or(Decimal::ZERO);
    let Some(available) = state.available_balance.checked_add(previous - amount) else {
        return Transition::overflow(state, amount);
    };
    state
        .in_flight_transactions
        .insert(event.transaction_id.clone(), amount);
    state.available_balance = available;
    raise_watermark(&mut state.last_sale_date_time, event.transaction_date_time);

    Transition::emit(state, Decimal::ZERO, BalanceReference::TransactionStarted)
        .with_violation(violation)
}

fn transaction_completed(mut state: MerchantLedgerState, event: &TransactionCompleted) -> Transition {
    let reserved = state.in_flight_transactions.get(&event.transaction_id).copied();
    let violation = reserved
        .is_none()
        .then(|| InvariantViolation::UnmatchedCompletion {
            transaction_id: event.transaction_id.clone(),
        });
    let amount = reserved.unwrap_or(Decimal::ZERO);

    let settled = if event.is_authorised {
        state.balance.checked_sub(amount)
    } else {
        Some(state.balance)
    };
    let Some(balance) = settled else {
        return Transition::overflow(state, amount);
    };
    state.in_flight_transactions.remove(&event.transaction_id);
    state.balance = balance;
    state.available_balance = balance;

    Transition::emit(state, amount, BalanceReference::TransactionCompleted).with_violation(violation)
}

fn fee_added(mut state: MerchantLedgerState, event: &MerchantFeeAdded) -> Transition {
    let (Some(balance), Some(available)) = (
        state.balance.checked_add(event.calculated_value),
        state.available_balance.checked_add(event.calculated_value),
    ) else {
        return Transition::overflow(state, event.calculated_value);
    };
    state.balance = balance;
    state.available_balance = available;
    raise_watermark(
        &mut state.last_fee_processed_date_time,
        event.event_created_date_time,
    );
    Transition::emit(
        state,
        event.calculated_value,
        BalanceReference::TransactionFeeProcessed,
    )
}
