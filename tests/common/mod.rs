#![allow(dead_code)]

use parking_lot::Mutex;
use row_relay::Relay::{ProcessedView, ProcessingError, Record, RecordHandler, StreamContext};
use row_relay::Context;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// What a [`CollectingHandler`] observed, shared with the test thread.
#[derive(Default)]
pub struct Seen {
    pub records: Mutex<Vec<Record>>,
    /// `current_record()` as reported by the view, one entry per record.
    pub positions: Mutex<Vec<u64>>,
    pub threads: Mutex<Vec<Option<String>>>,
    pub started: AtomicU64,
    pub ended: AtomicU64,
    /// How many records had been seen when the end hook ran.
    pub seen_at_end: AtomicU64,
}

impl Seen {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

/// Handler that records everything it sees.
///
/// Can be slowed down per record, held on a latch, or made to fail on a given
/// record number.
pub struct CollectingHandler {
    pub seen: Arc<Seen>,
    pub delay: Option<Duration>,
    pub fail_on: Option<u64>,
    pub latch: Option<Arc<AtomicBool>>,
}

impl CollectingHandler {
    pub fn new() -> (Self, Arc<Seen>) {
        let seen = Arc::new(Seen::default());
        (
            Self {
                seen: seen.clone(),
                delay: None,
                fail_on: None,
                latch: None,
            },
            seen,
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_on(mut self, record: u64) -> Self {
        self.fail_on = Some(record);
        self
    }

    /// Blocks every record until the latch is opened.
    pub fn held_by(mut self, latch: Arc<AtomicBool>) -> Self {
        self.latch = Some(latch);
        self
    }
}

impl RecordHandler<StreamContext> for CollectingHandler {
    fn process_started(&mut self, _context: &StreamContext) -> Result<(), ProcessingError> {
        self.seen.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn record_processed(
        &mut self,
        record: &Record,
        context: &ProcessedView<StreamContext>,
    ) -> Result<(), ProcessingError> {
        if let Some(latch) = &self.latch {
            while !latch.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let position = context.current_record();
        self.seen.records.lock().push(record.clone());
        self.seen.positions.lock().push(position);
        self.seen
            .threads
            .lock()
            .push(thread::current().name().map(str::to_string));

        if self.fail_on == Some(position) {
            return Err(ProcessingError::new(format!("cannot handle {:?}", record)));
        }
        Ok(())
    }

    fn process_ended(&mut self, _context: &StreamContext) -> Result<(), ProcessingError> {
        self.seen
            .seen_at_end
            .store(self.seen.count() as u64, Ordering::SeqCst);
        self.seen.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn numbered(count: usize) -> Vec<Record> {
    (0..count).map(|i| Record::from([i.to_string()])).collect()
}

pub fn open(latch: &AtomicBool) {
    latch.store(true, Ordering::SeqCst);
}
