//! Typed ledger events and the decoder that produces them from raw log entries.
//!
//! Raw events arrive as an event type name plus a JSON payload. Payload field
//! names follow the log's PascalCase convention; camelCase spellings are
//! accepted as well. Type names may carry a dotted namespace prefix, which is
//! ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use common::{EstateId, MerchantId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DecodeError;

/// The closed set of event kinds the ledger consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MerchantCreated,
    ManualDepositMade,
    TransactionStarted,
    TransactionCompleted,
    MerchantFeeAdded,
    SettledMerchantFeeAdded,
}

impl EventKind {
    /// Resolves an event type name, ignoring any namespace prefix.
    pub fn from_type_name(event_type: &str) -> Option<Self> {
        let name = event_type.rsplit('.').next().unwrap_or(event_type);
        let kind = match name {
            "MerchantCreatedEvent" | "MerchantCreated" => EventKind::MerchantCreated,
            "ManualDepositMadeEvent" | "ManualDepositMade" => EventKind::ManualDepositMade,
            "TransactionHasStartedEvent" | "TransactionStarted" => EventKind::TransactionStarted,
            "TransactionHasBeenCompletedEvent" | "TransactionCompleted" => {
                EventKind::TransactionCompleted
            }
            "MerchantFeeAddedToTransactionEvent" | "MerchantFeeAdded" => {
                EventKind::MerchantFeeAdded
            }
            "SettledMerchantFeeAddedToTransactionEvent" | "SettledMerchantFeeAdded" => {
                EventKind::SettledMerchantFeeAdded
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the type name this kind is written to the log under.
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::MerchantCreated => "MerchantCreatedEvent",
            EventKind::ManualDepositMade => "ManualDepositMadeEvent",
            EventKind::TransactionStarted => "TransactionHasStartedEvent",
            EventKind::TransactionCompleted => "TransactionHasBeenCompletedEvent",
            EventKind::MerchantFeeAdded => "MerchantFeeAddedToTransactionEvent",
            EventKind::SettledMerchantFeeAdded => "SettledMerchantFeeAddedToTransactionEvent",
        }
    }
}

/// A decoded event the ledger knows how to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    MerchantCreated(MerchantCreated),
    ManualDepositMade(ManualDepositMade),
    TransactionStarted(TransactionStarted),
    TransactionCompleted(TransactionCompleted),
    MerchantFeeAdded(MerchantFeeAdded),
}

impl LedgerEvent {
    /// The merchant this event belongs to.
    pub fn merchant_id(&self) -> &MerchantId {
        match self {
            LedgerEvent::MerchantCreated(e) => &e.merchant_id,
            LedgerEvent::ManualDepositMade(e) => &e.merchant_id,
            LedgerEvent::TransactionStarted(e) => &e.merchant_id,
            LedgerEvent::TransactionCompleted(e) => &e.merchant_id,
            LedgerEvent::MerchantFeeAdded(e) => &e.merchant_id,
        }
    }

    /// The estate this event belongs to.
    pub fn estate_id(&self) -> &EstateId {
        match self {
            LedgerEvent::MerchantCreated(e) => &e.estate_id,
            LedgerEvent::ManualDepositMade(e) => &e.estate_id,
            LedgerEvent::TransactionStarted(e) => &e.estate_id,
            LedgerEvent::TransactionCompleted(e) => &e.estate_id,
            LedgerEvent::MerchantFeeAdded(e) => &e.estate_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            LedgerEvent::MerchantCreated(_) => EventKind::MerchantCreated,
            LedgerEvent::ManualDepositMade(_) => EventKind::ManualDepositMade,
            LedgerEvent::TransactionStarted(_) => EventKind::TransactionStarted,
            LedgerEvent::TransactionCompleted(_) => EventKind::TransactionCompleted,
            LedgerEvent::MerchantFeeAdded(e) if e.settled => EventKind::SettledMerchantFeeAdded,
            LedgerEvent::MerchantFeeAdded(_) => EventKind::MerchantFeeAdded,
        }
    }
}

/// A merchant was registered under an estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MerchantCreated {
    #[serde(alias = "estateId")]
    pub estate_id: EstateId,
    #[serde(alias = "merchantId")]
    pub merchant_id: MerchantId,
    #[serde(alias = "merchantName")]
    pub merchant_name: String,
}

/// Money was deposited into a merchant's account by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManualDepositMade {
    #[serde(alias = "estateId")]
    pub estate_id: EstateId,
    #[serde(alias = "merchantId")]
    pub merchant_id: MerchantId,
    #[serde(alias = "amount")]
    pub amount: Decimal,
    #[serde(
        alias = "depositDateTime",
        alias = "EventDateTime",
        alias = "eventDateTime",
        deserialize_with = "business_time"
    )]
    pub deposit_date_time: DateTime<Utc>,
}

/// A sale transaction started and reserved an amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionStarted {
    #[serde(alias = "estateId")]
    pub estate_id: EstateId,
    #[serde(alias = "merchantId")]
    pub merchant_id: MerchantId,
    #[serde(alias = "transactionId")]
    pub transaction_id: TransactionId,
    #[serde(alias = "transactionAmount", alias = "Amount", alias = "amount")]
    pub transaction_amount: Decimal,
    #[serde(alias = "transactionType")]
    pub transaction_type: String,
    #[serde(alias = "transactionDateTime", deserialize_with = "business_time")]
    pub transaction_date_time: DateTime<Utc>,
}

/// A transaction finished, successfully or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionCompleted {
    #[serde(alias = "estateId")]
    pub estate_id: EstateId,
    #[serde(alias = "merchantId")]
    pub merchant_id: MerchantId,
    #[serde(alias = "transactionId")]
    pub transaction_id: TransactionId,
    #[serde(alias = "isAuthorised", alias = "IsSuccessful", alias = "isSuccessful")]
    pub is_authorised: bool,
}

/// A merchant fee was calculated for a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MerchantFeeAdded {
    #[serde(alias = "estateId")]
    pub estate_id: EstateId,
    #[serde(alias = "merchantId")]
    pub merchant_id: MerchantId,
    #[serde(alias = "transactionId")]
    pub transaction_id: TransactionId,
    #[serde(alias = "calculatedValue")]
    pub calculated_value: Decimal,
    #[serde(alias = "eventCreatedDateTime", deserialize_with = "business_time")]
    pub event_created_date_time: DateTime<Utc>,
    /// Set from the event type, not the payload.
    #[serde(skip)]
    pub settled: bool,
}

/// Decodes a raw log entry into a typed ledger event.
pub fn decode(event_type: &str, payload: &serde_json::Value) -> Result<LedgerEvent, DecodeError> {
    let kind = EventKind::from_type_name(event_type)
        .ok_or_else(|| DecodeError::UnrecognizedEventType(event_type.to_string()))?;

    let event = match kind {
        EventKind::MerchantCreated => LedgerEvent::MerchantCreated(parse(event_type, payload)?),
        EventKind::ManualDepositMade => LedgerEvent::ManualDepositMade(parse(event_type, payload)?),
        EventKind::TransactionStarted => {
            LedgerEvent::TransactionStarted(parse(event_type, payload)?)
        }
        EventKind::TransactionCompleted => {
            LedgerEvent::TransactionCompleted(parse(event_type, payload)?)
        }
        EventKind::MerchantFeeAdded | EventKind::SettledMerchantFeeAdded => {
            let mut fee: MerchantFeeAdded = parse(event_type, payload)?;
            fee.settled = kind == EventKind::SettledMerchantFeeAdded;
            LedgerEvent::MerchantFeeAdded(fee)
        }
    };

    if event.merchant_id().as_str().is_empty() || event.estate_id().as_str().is_empty() {
        return Err(DecodeError::MalformedEvent {
            event_type: event_type.to_string(),
            reason: "empty estate or merchant identifier".to_string(),
        });
    }

    Ok(event)
}

/// Extracts the merchant key from a raw payload without decoding it.
pub fn merchant_key(payload: &serde_json::Value) -> Option<MerchantId> {
    string_field(payload, "MerchantId", "merchantId").map(MerchantId::from)
}

/// Extracts the estate key from a raw payload without decoding it.
pub fn estate_key(payload: &serde_json::Value) -> Option<EstateId> {
    string_field(payload, "EstateId", "estateId").map(EstateId::from)
}

/// Parses an ISO-8601 business timestamp; offset-less values are taken as UTC.
pub fn parse_business_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn string_field<'a>(payload: &'a serde_json::Value, pascal: &str, camel: &str) -> Option<&'a str> {
    payload
        .get(pascal)
        .or_else(|| payload.get(camel))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

fn parse<'a, T: Deserialize<'a>>(
    event_type: &str,
    payload: &'a serde_json::Value,
) -> Result<T, DecodeError> {
    T::deserialize(payload).map_err(|e| DecodeError::MalformedEvent {
        event_type: event_type.to_string(),
        reason: e.to_string(),
    })
}

fn business_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_business_time(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const ESTATE: &str = "2af2dab2-86d6-44e3-bcf8-51bec65cf8bc";
    const MERCHANT: &str = "6be48c04-a00e-4985-a50c-e27461ca47e1";

    #[test]
    fn decodes_merchant_created() {
        let payload = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "MerchantName": "Test Merchant 1"
        });

        let event = decode("MerchantCreatedEvent", &payload).unwrap();
        let LedgerEvent::MerchantCreated(created) = event else {
            panic!("expected MerchantCreated");
        };
        assert_eq!(created.merchant_id.as_str(), MERCHANT);
        assert_eq!(created.merchant_name, "Test Merchant 1");
    }

    #[test]
    fn strips_namespace_from_type_name() {
        let kind = EventKind::from_type_name("EstateManagement.Merchant.DomainEvents.MerchantCreatedEvent");
        assert_eq!(kind, Some(EventKind::MerchantCreated));
        assert_eq!(EventKind::from_type_name("ManualDepositMade"), Some(EventKind::ManualDepositMade));
    }

    #[test]
    fn decodes_deposit_with_exact_amount_and_time() {
        let payload = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "Amount": 1000.25,
            "DepositDateTime": "2020-05-30T06:21:31.356Z"
        });

        let LedgerEvent::ManualDepositMade(deposit) =
            decode("ManualDepositMadeEvent", &payload).unwrap()
        else {
            panic!("expected ManualDepositMade");
        };
        assert_eq!(deposit.amount, dec!(1000.25));
        assert_eq!(
            deposit.deposit_date_time,
            parse_business_time("2020-05-30T06:21:31.356Z").unwrap()
        );
    }

    #[test]
    fn accepts_camel_case_and_string_amounts() {
        let payload = json!({
            "estateId": ESTATE,
            "merchantId": MERCHANT,
            "amount": "12.50",
            "eventDateTime": "2020-05-30T06:21:31.356"
        });

        let LedgerEvent::ManualDepositMade(deposit) = decode("ManualDepositMade", &payload).unwrap()
        else {
            panic!("expected ManualDepositMade");
        };
        assert_eq!(deposit.amount, dec!(12.50));
    }

    #[test]
    fn decodes_transaction_lifecycle() {
        let started = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "TransactionId": "c4c33d75-f011-40e4-9d97-1f428ab563d8",
            "TransactionAmount": 100.0,
            "TransactionType": "Sale",
            "TransactionDateTime": "2020-05-16T07:47:51.6617562+00:00"
        });
        let completed = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "TransactionId": "c4c33d75-f011-40e4-9d97-1f428ab563d8",
            "IsAuthorised": false
        });

        let event = decode("TransactionHasStartedEvent", &started).unwrap();
        assert_eq!(event.kind(), EventKind::TransactionStarted);

        let LedgerEvent::TransactionCompleted(done) =
            decode("TransactionHasBeenCompletedEvent", &completed).unwrap()
        else {
            panic!("expected TransactionCompleted");
        };
        assert!(!done.is_authorised);
    }

    #[test]
    fn settled_fee_variant_is_flagged() {
        let payload = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "TransactionId": "c4c33d75-f011-40e4-9d97-1f428ab563d8",
            "CalculatedValue": 0.5,
            "EventCreatedDateTime": "2020-05-16T07:47:51.6617562+00:00"
        });

        let settled = decode("SettledMerchantFeeAddedToTransactionEvent", &payload).unwrap();
        let plain = decode("MerchantFeeAddedToTransactionEvent", &payload).unwrap();
        assert_eq!(settled.kind(), EventKind::SettledMerchantFeeAdded);
        assert_eq!(plain.kind(), EventKind::MerchantFeeAdded);
    }

    #[test]
    fn unknown_type_is_unrecognized() {
        let err = decode("AddressAddedEvent", &json!({"MerchantId": MERCHANT})).unwrap_err();
        assert_eq!(err, DecodeError::UnrecognizedEventType("AddressAddedEvent".to_string()));
        assert_eq!(err.kind(), "unrecognized");
    }

    #[test]
    fn missing_field_is_malformed() {
        let payload = json!({"EstateId": ESTATE, "MerchantId": MERCHANT});
        let err = decode("ManualDepositMadeEvent", &payload).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedEvent { ref reason, .. } if reason.contains("Amount")));
    }

    #[test]
    fn mistyped_field_is_malformed() {
        let payload = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "TransactionId": "t1",
            "IsAuthorised": "yes"
        });
        let err = decode("TransactionHasBeenCompletedEvent", &payload).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn invalid_timestamp_is_malformed() {
        let payload = json!({
            "EstateId": ESTATE,
            "MerchantId": MERCHANT,
            "Amount": 1,
            "DepositDateTime": "yesterday"
        });
        assert!(decode("ManualDepositMadeEvent", &payload).is_err());
    }

    #[test]
    fn empty_merchant_id_is_malformed() {
        let payload = json!({"EstateId": ESTATE, "MerchantId": "", "MerchantName": "x"});
        let err = decode("MerchantCreatedEvent", &payload).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn merchant_key_reads_payload_only() {
        assert_eq!(
            merchant_key(&json!({"MerchantId": MERCHANT})),
            Some(MerchantId::from(MERCHANT))
        );
        assert_eq!(
            merchant_key(&json!({"merchantId": MERCHANT})),
            Some(MerchantId::from(MERCHANT))
        );
        assert_eq!(merchant_key(&json!({"MerchantId": ""})), None);
        assert_eq!(merchant_key(&json!({"MerchantId": 7})), None);
        assert_eq!(estate_key(&json!({"EstateId": ESTATE})), Some(EstateId::from(ESTATE)));
    }

    #[test]
    fn parses_offset_and_naive_timestamps() {
        let with_offset = parse_business_time("2020-05-16T07:47:51.6617562+00:00").unwrap();
        let naive = parse_business_time("2020-05-16T07:47:51.6617562").unwrap();
        assert_eq!(with_offset, naive);
        assert!(parse_business_time("16/05/2020").is_none());
    }
}
