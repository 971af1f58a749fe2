mod common;

use common::{numbered, open, CollectingHandler};
use row_relay::Relay::{DispatcherBuilder, InFlightLimit, Record, StreamContext};
use serial_test::serial;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
#[serial]
fn producer_blocks_when_worker_falls_behind() {
    let delay = Duration::from_millis(20);
    let (handler, seen) = CollectingHandler::new();
    let mut dispatcher = DispatcherBuilder::new()
        .with_limit(2)
        .build_for_stream(handler.with_delay(delay));
    let handle = dispatcher.handle();
    let context = StreamContext::new();

    dispatcher.on_start(&context).unwrap();
    let start = Instant::now();
    for record in numbered(5) {
        dispatcher.on_record(record, &context).unwrap();
    }
    let accepted_after = start.elapsed();
    dispatcher.on_end(&context).unwrap();

    println!("5 records accepted after {:?}", accepted_after);
    // The fifth record has to wait for the third one to be handled
    assert!(accepted_after >= delay * 3);
    assert!(handle.backpressure_waits() >= 1);
    assert_eq!(seen.records(), numbered(5));
}

#[test]
fn outstanding_records_never_exceed_the_limit() {
    for limit in [2u64, 3, 7] {
        let (handler, seen) = CollectingHandler::new();
        let mut dispatcher = DispatcherBuilder::new()
            .with_limit(limit as i64)
            .build_for_stream(handler);
        assert_eq!(dispatcher.limit(), InFlightLimit::Bounded(limit));
        let context = StreamContext::new();

        dispatcher.on_start(&context).unwrap();
        for (i, record) in numbered(400).into_iter().enumerate() {
            dispatcher.on_record(record, &context).unwrap();
            assert!(
                dispatcher.pending() <= limit,
                "{} outstanding after record {} with limit {}",
                dispatcher.pending(),
                i,
                limit
            );
            if fastrand::u8(..) < 16 {
                std::thread::sleep(Duration::from_micros(fastrand::u64(50..500)));
            }
        }
        dispatcher.on_end(&context).unwrap();
        assert_eq!(seen.count(), 400);
    }
}

#[test]
#[serial]
fn unbounded_producer_never_blocks() {
    let latch = Arc::new(AtomicBool::new(false));
    let (handler, seen) = CollectingHandler::new();
    let mut dispatcher = DispatcherBuilder::new()
        .with_limit(-1)
        .build_for_stream(handler.held_by(latch.clone()));
    let handle = dispatcher.handle();
    let context = StreamContext::new();

    dispatcher.on_start(&context).unwrap();
    // The handler is stuck on the first record the whole time
    for i in 0..10_000 {
        dispatcher
            .on_record(Record::from([i.to_string()]), &context)
            .unwrap();
    }
    assert_eq!(dispatcher.pending(), 10_000);
    assert!(handle.processed() <= 1);
    assert_eq!(handle.backpressure_waits(), 0);

    open(&latch);
    dispatcher.on_end(&context).unwrap();
    assert_eq!(seen.count(), 10_000);
}

#[test]
#[serial]
fn limit_of_one_behaves_as_unbounded() {
    let latch = Arc::new(AtomicBool::new(false));
    let (handler, seen) = CollectingHandler::new();
    let mut dispatcher = DispatcherBuilder::new()
        .with_limit(1)
        .build_for_stream(handler.held_by(latch.clone()));
    let context = StreamContext::new();

    dispatcher.on_start(&context).unwrap();
    for record in numbered(50) {
        dispatcher.on_record(record, &context).unwrap();
    }
    assert_eq!(dispatcher.pending(), 50);

    open(&latch);
    dispatcher.on_end(&context).unwrap();
    assert_eq!(seen.records(), numbered(50));
}
