//! Per-merchant ledger read model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{EstateId, MerchantId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The running ledger for one merchant.
///
/// `balance` tracks settled money movements only. `available_balance` is the
/// settled balance less whatever is reserved by transactions that have
/// started but not completed. The three `last_*` fields are watermarks: they
/// only ever move forward in business time, whatever order events arrive in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantLedgerState {
    pub estate_id: EstateId,
    pub merchant_id: MerchantId,
    pub merchant_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub available_balance: Decimal,
    pub last_deposit_date_time: Option<DateTime<Utc>>,
    pub last_sale_date_time: Option<DateTime<Utc>>,
    pub last_fee_processed_date_time: Option<DateTime<Utc>>,
    /// Amount reserved by each started, not yet completed, transaction.
    pub in_flight_transactions: BTreeMap<TransactionId, Decimal>,
}

impl MerchantLedgerState {
    /// Creates the ledger for a newly created merchant: zero balances, no watermarks.
    pub fn new(estate_id: EstateId, merchant_id: MerchantId, merchant_name: impl Into<String>) -> Self {
        Self {
            estate_id,
            merchant_id,
            merchant_name: merchant_name.into(),
            balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            last_deposit_date_time: None,
            last_sale_date_time: None,
            last_fee_processed_date_time: None,
            in_flight_transactions: BTreeMap::new(),
        }
    }
}

/// Raises a timestamp watermark to `observed` if it is later.
///
/// Returns true if the watermark moved.
pub fn raise_watermark(watermark: &mut Option<DateTime<Utc>>, observed: DateTime<Utc>) -> bool {
    match watermark {
        Some(current) if *current >= observed => false,
        _ => {
            *watermark = Some(observed);
            true
        }
    }
}
