use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Progress information handed to every lifecycle call.
pub trait Context: Send + Sync + 'static {
    /// Number of the record currently being handled, counting from 1.
    ///
    /// Zero before the first record.
    fn current_record(&self) -> u64;
}

/// Minimal producer-side context: a shared record counter and optional headers.
///
/// Clones share the same counter, so a clone held by the worker observes the
/// producer's progress.
#[derive(Clone, Debug, Default)]
pub struct StreamContext {
    records: Arc<AtomicU64>,
    headers: Option<Arc<[String]>>,
}

impl StreamContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = Some(headers.into_iter().map(Into::into).collect());
        self
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Marks one more record as produced and returns its number.
    pub fn record_produced(&self) -> u64 {
        self.records.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Context for StreamContext {
    fn current_record(&self) -> u64 {
        self.records.load(Ordering::Acquire)
    }
}

/// Counter of records the relay worker has handed to the handler.
///
/// Written only by the worker; readable from anywhere.
#[derive(Clone, Debug, Default)]
pub struct ProcessedCounter(Arc<CachePadded<AtomicU64>>);

impl ProcessedCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Context seen by the handler on the worker thread.
///
/// Delegates to the producer's context, except that [`Context::current_record`]
/// reports the worker's own progress rather than the producer's.
#[derive(Clone, Debug)]
pub struct ProcessedView<C> {
    inner: C,
    processed: ProcessedCounter,
}

impl<C: Context> ProcessedView<C> {
    pub(crate) fn new(inner: C, processed: ProcessedCounter) -> Self {
        Self { inner, processed }
    }

    /// The producer's context.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// How far the producer has got, as opposed to the worker.
    pub fn produced(&self) -> u64 {
        self.inner.current_record()
    }

    pub(crate) fn counter(&self) -> &ProcessedCounter {
        &self.processed
    }
}

impl<C: Context> Context for ProcessedView<C> {
    fn current_record(&self) -> u64 {
        self.processed.get()
    }
}
