use std::sync::Arc;

use wxpay_notify_engine::{
    db_types::{EventOutcome, InsertEventResult, NewEventRecord},
    test_utils::{
        callbacks::CountingCallback,
        fixtures::{build_envelope, signed_now, test_certificate, transaction_resource, TEST_APIV3_KEY, TEST_SERIAL_NO},
        prepare_env::{prepare_test_env, random_db_url},
    },
    EventStore,
    EventStoreError,
    MemoryCertificateSource,
    NotificationProcessor,
    PayloadDecryptor,
    ProcessingOutcome,
    ProcessorOptions,
    SqliteEventStore,
};

#[tokio::test]
async fn insert_if_absent_keeps_the_first_record() {
    let store = prepare_test_env(&random_db_url()).await;
    let first = store.insert_if_absent(NewEventRecord::new("E1", "TRANSACTION.SUCCESS")).await.unwrap();
    let InsertEventResult::Inserted(first) = first else { panic!("Expected an insert") };
    assert_eq!(first.outcome, EventOutcome::Pending);
    let again = store.insert_if_absent(NewEventRecord::new("E1", "TRANSACTION.SUCCESS")).await.unwrap();
    let InsertEventResult::Existing(existing) = again else { panic!("Expected the existing record") };
    assert_eq!(existing.event_id, "E1");
    assert_eq!(existing.attempts, 1);
}

#[tokio::test]
async fn outcomes_and_reclaims() {
    let store = prepare_test_env(&random_db_url()).await;
    store
        .insert_if_absent(NewEventRecord::new("E1", "TRANSACTION.SUCCESS").with_idempotency_token("order-1"))
        .await
        .unwrap();
    let failed = store.mark_outcome("E1", EventOutcome::Failure).await.unwrap();
    assert_eq!(failed.outcome, EventOutcome::Failure);
    assert_eq!(failed.idempotency_token.as_deref(), Some("order-1"));

    let reclaimed = store.reclaim(&failed).await.unwrap().expect("First reclaim wins");
    assert_eq!((reclaimed.outcome, reclaimed.attempts), (EventOutcome::Pending, 2));
    assert!(store.reclaim(&failed).await.unwrap().is_none());

    let done = store.mark_outcome("E1", EventOutcome::Success).await.unwrap();
    assert_eq!(done.attempts, 2);
    assert_eq!(store.fetch_event("E1").await.unwrap(), Some(done));

    let err = store.mark_outcome("missing", EventOutcome::Success).await.unwrap_err();
    assert!(matches!(err, EventStoreError::EventNotFound(_)));
}

#[tokio::test]
async fn records_survive_reconnects() {
    let url = random_db_url();
    let store = prepare_test_env(&url).await;
    store.insert_if_absent(NewEventRecord::new("E1", "REFUND.SUCCESS")).await.unwrap();
    store.mark_outcome("E1", EventOutcome::Success).await.unwrap();
    drop(store);
    let store = SqliteEventStore::connect(&url).await.unwrap();
    let record = store.fetch_event("E1").await.unwrap().unwrap();
    assert_eq!(record.outcome, EventOutcome::Success);
    assert_eq!(record.event_type, "REFUND.SUCCESS");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_deliveries_against_sqlite() {
    let store = prepare_test_env(&random_db_url()).await;
    let callback = CountingCallback::new();
    let source = MemoryCertificateSource::new(vec![test_certificate(TEST_SERIAL_NO)]);
    let decryptor = PayloadDecryptor::new(TEST_APIV3_KEY.as_bytes()).unwrap();
    let processor = Arc::new(NotificationProcessor::new(
        source,
        store.clone(),
        callback.clone(),
        decryptor,
        ProcessorOptions::default(),
    ));
    let body = build_envelope("EV-1", "TRANSACTION.SUCCESS", &transaction_resource("T1", "order-1", 100));
    let tasks = (0..8)
        .map(|_| {
            let processor = Arc::clone(&processor);
            let body = body.clone();
            tokio::spawn(async move { processor.handle(&signed_now(body.as_bytes()), body.as_bytes()).await })
        })
        .collect::<Vec<_>>();
    let mut acknowledged = 0;
    for task in tasks {
        if let ProcessingOutcome::Acknowledged { .. } = task.await.unwrap() {
            acknowledged += 1;
        }
    }
    assert_eq!(acknowledged, 1);
    assert_eq!(callback.calls(), 1);
    assert_eq!(store.fetch_event("EV-1").await.unwrap().unwrap().outcome, EventOutcome::Success);
}
