// Heap tracking for relay runs
//
// dhat only allows one profiler per process, so everything that needs it lives
// in a single #[serial_test::serial] test.
//
// cargo test --test allocation_tracking -- --nocapture

use row_relay::Relay::{DispatcherBuilder, ProcessedView, ProcessingError, Record, StreamContext};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

const LIMIT: usize = 4;

fn slow_handler(
    _record: &Record,
    _view: &ProcessedView<StreamContext>,
) -> Result<(), ProcessingError> {
    for _ in 0..2_000 {
        std::hint::spin_loop();
    }
    Ok(())
}

fn run(limit: i64, count: usize) {
    let mut dispatcher = DispatcherBuilder::new()
        .with_limit(limit)
        .build_for_stream(slow_handler);
    let context = StreamContext::new();

    dispatcher.on_start(&context).unwrap();
    for i in 0..count {
        dispatcher
            .on_record(Record::from([i.to_string()]), &context)
            .unwrap();
    }
    dispatcher.on_end(&context).unwrap();
}

#[test]
#[serial_test::serial]
fn relay_nodes_are_bounded_and_freed() {
    let _profiler = dhat::Profiler::builder().testing().build();

    // Warm up thread spawning and tracing callsites
    run(LIMIT as i64, 1);
    let baseline = dhat::HeapStats::get();

    // Bounded: at most LIMIT nodes, each holding a record (node, fields, string)
    run(LIMIT as i64, 2_000);
    let bounded = dhat::HeapStats::get();
    println!("bounded run: {:?}", bounded);

    assert!(bounded.total_blocks - baseline.total_blocks >= 3 * 2_000);
    assert!(
        bounded.max_blocks <= baseline.curr_blocks + 3 * LIMIT + 64,
        "peak of {} blocks with a baseline of {}",
        bounded.max_blocks,
        baseline.curr_blocks
    );

    // Everything allocated for the run is gone once it ends
    run(-1, 2_000);
    let unbounded = dhat::HeapStats::get();
    println!("unbounded run: {:?}", unbounded);
    assert!(unbounded.curr_blocks <= baseline.curr_blocks + 16);
}
