//! Order-independence properties of the merchant ledger.

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{EstateId, MerchantId, TransactionId};
use domain::{
    LedgerEvent, ManualDepositMade, MerchantCreated, MerchantFeeAdded, MerchantLedgerState,
    Outcome, TransactionStarted, transition,
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn estate() -> EstateId {
    EstateId::from("2af2dab2-86d6-44e3-bcf8-51bec65cf8bc")
}

fn merchant() -> MerchantId {
    MerchantId::from("6be48c04-a00e-4985-a50c-e27461ca47e1")
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap()
}

fn created() -> LedgerEvent {
    LedgerEvent::MerchantCreated(MerchantCreated {
        estate_id: estate(),
        merchant_id: merchant(),
        merchant_name: "Test Merchant 1".to_string(),
    })
}

/// (amount in cents, seconds after base time, is fee)
type Movement = (i64, i64, bool);

fn movement_event(index: usize, (cents, offset, is_fee): Movement) -> LedgerEvent {
    let amount = Decimal::new(cents, 2);
    let at = base_time() + Duration::seconds(offset);
    if is_fee {
        LedgerEvent::MerchantFeeAdded(MerchantFeeAdded {
            estate_id: estate(),
            merchant_id: merchant(),
            transaction_id: TransactionId::new(format!("tx-{index}")),
            calculated_value: amount,
            event_created_date_time: at,
            settled: index % 2 == 0,
        })
    } else {
        LedgerEvent::ManualDepositMade(ManualDepositMade {
            estate_id: estate(),
            merchant_id: merchant(),
            amount,
            deposit_date_time: at,
        })
    }
}

/// (reserved cents, seconds after base time)
type Sale = (i64, i64);

fn sale_event(index: usize, (cents, offset): Sale) -> LedgerEvent {
    LedgerEvent::TransactionStarted(TransactionStarted {
        estate_id: estate(),
        merchant_id: merchant(),
        transaction_id: TransactionId::new(format!("sale-{index}")),
        transaction_amount: Decimal::new(cents, 2),
        transaction_type: "Sale".to_string(),
        transaction_date_time: base_time() + Duration::seconds(offset),
    })
}

fn replay(events: impl IntoIterator<Item = LedgerEvent>) -> MerchantLedgerState {
    let mut state = None;
    for event in std::iter::once(created()).chain(events) {
        state = transition(state, &event).state;
    }
    state.expect("merchant was created")
}

fn movements() -> impl Strategy<Value = (Vec<Movement>, Vec<Movement>)> {
    prop::collection::vec((0i64..10_000_000, 0i64..10_000_000, any::<bool>()), 1..25)
        .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
}

fn sales() -> impl Strategy<Value = (Vec<Sale>, Vec<Sale>)> {
    prop::collection::vec((0i64..10_000_000, 0i64..10_000_000), 1..25)
        .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Final balances equal the sum of applied amounts, whatever the delivery order.
    #[test]
    fn balances_are_order_independent((original, shuffled) in movements()) {
        let expected: Decimal = original.iter().map(|(c, _, _)| Decimal::new(*c, 2)).sum();

        let in_order = replay(original.iter().enumerate().map(|(i, m)| movement_event(i, *m)));
        let reordered = replay(shuffled.iter().enumerate().map(|(i, m)| movement_event(i, *m)));

        prop_assert_eq!(in_order.balance, expected);
        prop_assert_eq!(in_order.available_balance, expected);
        prop_assert_eq!(reordered.balance, expected);
        prop_assert_eq!(reordered.available_balance, expected);
    }

    /// Timestamp watermarks equal the latest business time of their event kind.
    #[test]
    fn watermarks_track_maximum_business_time((original, shuffled) in movements()) {
        let latest = |fees: bool| {
            original
                .iter()
                .filter(|(_, _, is_fee)| *is_fee == fees)
                .map(|(_, offset, _)| base_time() + Duration::seconds(*offset))
                .max()
        };

        let state = replay(shuffled.iter().enumerate().map(|(i, m)| movement_event(i, *m)));

        prop_assert_eq!(state.last_deposit_date_time, latest(false));
        prop_assert_eq!(state.last_fee_processed_date_time, latest(true));
        prop_assert_eq!(state.last_sale_date_time, None);
    }

    /// The sale watermark is the latest start time, and reservations only touch the available balance.
    #[test]
    fn sale_watermark_tracks_maximum_start_time((original, shuffled) in sales()) {
        let latest = original
            .iter()
            .map(|(_, offset)| base_time() + Duration::seconds(*offset))
            .max();
        let reserved: Decimal = original.iter().map(|(c, _)| Decimal::new(*c, 2)).sum();

        let state = replay(shuffled.iter().enumerate().map(|(i, s)| sale_event(i, *s)));

        prop_assert_eq!(state.last_sale_date_time, latest);
        prop_assert_eq!(state.balance, Decimal::ZERO);
        prop_assert_eq!(state.available_balance, -reserved);
        prop_assert_eq!(state.in_flight_transactions.len(), original.len());
    }

    /// Replaying the creation event never touches identity or balances.
    #[test]
    fn creation_replay_is_idempotent((original, _) in movements()) {
        let state = replay(original.iter().enumerate().map(|(i, m)| movement_event(i, *m)));

        let replayed = transition(Some(state.clone()), &created());

        prop_assert_eq!(replayed.outcome, Outcome::Replayed);
        prop_assert_eq!(replayed.state, Some(state));
    }
}

#[test]
fn unknown_merchant_never_gains_state() {
    let event = movement_event(0, (100, 0, false));
    let t = transition(None, &event);
    assert_eq!(t.outcome, Outcome::UnknownMerchant);
    assert!(t.state.is_none());
    assert!(t.change.is_none());
}
