use criterion::{Criterion, criterion_group, criterion_main};
use domain::{LedgerEvent, decode, transition};
use serde_json::json;

const ESTATE: &str = "2af2dab2-86d6-44e3-bcf8-51bec65cf8bc";
const MERCHANT: &str = "6be48c04-a00e-4985-a50c-e27461ca47e1";

fn sale_events(count: usize) -> Vec<LedgerEvent> {
    let mut events = vec![
        decode(
            "MerchantCreatedEvent",
            &json!({"EstateId": ESTATE, "MerchantId": MERCHANT, "MerchantName": "Bench Merchant"}),
        )
        .unwrap(),
        decode(
            "ManualDepositMadeEvent",
            &json!({
                "EstateId": ESTATE,
                "MerchantId": MERCHANT,
                "Amount": 1_000_000.0,
                "DepositDateTime": "2020-05-30T06:21:31.356Z"
            }),
        )
        .unwrap(),
    ];

    for i in 0..count {
        let tx = format!("tx-{i}");
        events.push(
            decode(
                "TransactionHasStartedEvent",
                &json!({
                    "EstateId": ESTATE,
                    "MerchantId": MERCHANT,
                    "TransactionId": tx,
                    "TransactionAmount": 10.0,
                    "TransactionType": "Sale",
                    "TransactionDateTime": "2020-06-01T10:00:00Z"
                }),
            )
            .unwrap(),
        );
        events.push(
            decode(
                "TransactionHasBeenCompletedEvent",
                &json!({"EstateId": ESTATE, "MerchantId": MERCHANT, "TransactionId": tx, "IsAuthorised": true}),
            )
            .unwrap(),
        );
    }
    events
}

fn bench_decode_deposit(c: &mut Criterion) {
    let payload = json!({
        "EstateId": ESTATE,
        "MerchantId": MERCHANT,
        "Amount": 1000.0,
        "DepositDateTime": "2020-05-30T06:21:31.356Z"
    });

    c.bench_function("domain/decode_deposit", |b| {
        b.iter(|| decode("ManualDepositMadeEvent", &payload).unwrap());
    });
}

fn bench_replay_1000_sales(c: &mut Criterion) {
    let events = sale_events(1000);

    c.bench_function("domain/replay_1000_sales", |b| {
        b.iter(|| {
            let mut state = None;
            for event in &events {
                state = transition(state, event).state;
            }
            state
        });
    });
}

criterion_group!(benches, bench_decode_deposit, bench_replay_1000_sales);
criterion_main!(benches);
