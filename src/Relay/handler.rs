use super::context::{Context, ProcessedView, StreamContext};
use super::error::ProcessingError;
use super::record::Record;

/// Downstream consumer of records.
///
/// `process_started` and `process_ended` run on the producer thread;
/// `record_processed` runs on the relay worker thread, once per record, in the
/// order the records were accepted. The handler is moved between the two
/// threads, never shared, so it only needs to be `Send`.
pub trait RecordHandler<C: Context = StreamContext>: Send + 'static {
    fn process_started(&mut self, _context: &C) -> Result<(), ProcessingError> {
        Ok(())
    }

    fn record_processed(
        &mut self,
        record: &Record,
        context: &ProcessedView<C>,
    ) -> Result<(), ProcessingError>;

    /// Runs after every accepted record has been handled (or the run failed).
    fn process_ended(&mut self, _context: &C) -> Result<(), ProcessingError> {
        Ok(())
    }
}

impl<C, F> RecordHandler<C> for F
where
    C: Context,
    F: FnMut(&Record, &ProcessedView<C>) -> Result<(), ProcessingError> + Send + 'static,
{
    fn record_processed(
        &mut self,
        record: &Record,
        context: &ProcessedView<C>,
    ) -> Result<(), ProcessingError> {
        self(record, context)
    }
}

/// Decides what the worker does when the handler fails on a record.
///
/// Returning `Ok` keeps the run going with the next record; returning `Err`
/// stops the worker and the error surfaces from `on_end`.
pub trait ErrorPolicy: Send + Sync + 'static {
    fn handle_error(
        &self,
        error: ProcessingError,
        record: &Record,
        processed: u64,
    ) -> Result<(), ProcessingError>;
}

/// Re-raises every failure. The default policy.
#[derive(Debug, Default, Copy, Clone)]
pub struct Rethrow;

impl ErrorPolicy for Rethrow {
    fn handle_error(
        &self,
        error: ProcessingError,
        _record: &Record,
        _processed: u64,
    ) -> Result<(), ProcessingError> {
        Err(error)
    }
}

/// Logs the failure and moves on to the next record.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogAndContinue;

impl ErrorPolicy for LogAndContinue {
    fn handle_error(
        &self,
        error: ProcessingError,
        record: &Record,
        processed: u64,
    ) -> Result<(), ProcessingError> {
        tracing::warn!(
            record = processed,
            fields = record.len(),
            error = %error,
            "record handler failed, skipping record"
        );
        Ok(())
    }
}
