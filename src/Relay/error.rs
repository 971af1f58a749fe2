//! Error types for relay runs.
//!
//! [`ProcessingError`] is what a handler returns when it cannot process a record.
//! [`DispatchError`] is what the dispatcher returns to the producer; handler
//! failures reach the producer wrapped in [`DispatchError::Processing`], and only
//! at the end of the stream, since the handler runs on the worker thread.

use std::borrow::Cow;
use std::error;

/// Convenient result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// Failure raised by a record handler.
#[derive(Debug, thiserror::Error)]
#[error("{message}{}", .record.map(|n| format!(" (record {n})")).unwrap_or_default())]
pub struct ProcessingError {
    message: Cow<'static, str>,
    record: Option<u64>,
    #[source]
    source: Option<BoxError>,
}

impl ProcessingError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            record: None,
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<Cow<'static, str>>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            message: message.into(),
            record: None,
            source: Some(source.into()),
        }
    }

    /// Tags the error with the number of the record being processed, unless
    /// the handler already did.
    pub fn at_record(mut self, record: u64) -> Self {
        self.record.get_or_insert(record);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn record(&self) -> Option<u64> {
        self.record
    }
}

/// Errors returned by the dispatcher to the producer.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handler failed on a record and the error policy gave up.
    #[error("error executing process")]
    Processing {
        #[source]
        source: ProcessingError,
        /// Records accepted but never handed to the handler.
        undelivered: u64,
    },

    /// The start or end hook failed.
    #[error("{hook} hook failed")]
    Hook {
        hook: &'static str,
        #[source]
        source: ProcessingError,
    },

    #[error("relay worker panicked")]
    WorkerPanicked,

    /// The worker was aborted and stopped without draining.
    #[error("relay worker aborted with {undelivered} record(s) undelivered")]
    Aborted { undelivered: u64 },

    /// The producer was interrupted while waiting on backpressure.
    #[error("producer interrupted while waiting for the relay worker")]
    Interrupted,

    #[error("dispatcher is not running")]
    NotRunning,

    #[error("dispatcher is already running")]
    AlreadyRunning,

    /// A previous run lost the handler (worker panic or spawn failure).
    #[error("handler was lost by a previous run")]
    HandlerLost,

    #[error("failed to spawn relay worker: {0}")]
    Spawn(#[source] std::io::Error),
}

impl DispatchError {
    /// The handler failure behind this error, if there is one.
    pub fn processing_error(&self) -> Option<&ProcessingError> {
        match self {
            DispatchError::Processing { source, .. } | DispatchError::Hook { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Invalid dispatcher configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: &'static str, value: String },
}
