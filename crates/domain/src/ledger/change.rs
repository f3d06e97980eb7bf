//! The balance-change record derived from each mutating event.

use common::{EstateId, MerchantId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::MerchantLedgerState;

/// Why a merchant's balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceReference {
    #[serde(rename = "Merchant Created")]
    MerchantCreated,
    #[serde(rename = "Merchant Deposit")]
    MerchantDeposit,
    #[serde(rename = "Transaction Started")]
    TransactionStarted,
    #[serde(rename = "Transaction Completed")]
    TransactionCompleted,
    #[serde(rename = "Transaction Fee Processed")]
    TransactionFeeProcessed,
}

impl BalanceReference {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceReference::MerchantCreated => "Merchant Created",
            BalanceReference::MerchantDeposit => "Merchant Deposit",
            BalanceReference::TransactionStarted => "Transaction Started",
            BalanceReference::TransactionCompleted => "Transaction Completed",
            BalanceReference::TransactionFeeProcessed => "Transaction Fee Processed",
        }
    }
}

impl std::fmt::Display for BalanceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived event recording a merchant's balances after one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceChanged {
    pub aggregate_id: MerchantId,
    pub estate_id: EstateId,
    pub merchant_id: MerchantId,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub available_balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change_amount: Decimal,
    pub reference: BalanceReference,
}

impl BalanceChanged {
    /// Event type name of the derived event in the log.
    pub const EVENT_TYPE: &'static str = "MerchantBalanceChangedEvent";

    /// Records the post-update balances of `state`.
    pub fn from_state(
        state: &MerchantLedgerState,
        change_amount: Decimal,
        reference: BalanceReference,
    ) -> Self {
        Self {
            aggregate_id: state.merchant_id.clone(),
            estate_id: state.estate_id.clone(),
            merchant_id: state.merchant_id.clone(),
            balance: state.balance,
            available_balance: state.available_balance,
            change_amount,
            reference,
        }
    }
}
