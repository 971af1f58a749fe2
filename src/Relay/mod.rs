mod builder;
mod context;
mod debug;
mod dispatcher;
mod error;
mod handler;
mod record;

pub use builder::{DispatcherBuilder, DispatcherConfig, InFlightLimit, LIMIT_ENV, THREAD_NAME_ENV};
pub use context::{Context, ProcessedCounter, ProcessedView, StreamContext};
pub use dispatcher::{Dispatcher, DispatcherHandle, Phase};
pub use error::{ConfigError, DispatchError, DispatchResult, ProcessingError};
pub use handler::{ErrorPolicy, LogAndContinue, RecordHandler, Rethrow};
pub use record::{Field, Record};

pub mod Queue {
    pub mod Queue;
    pub mod Queue_impl;
    pub use Queue::{RelayConsumer, RelayProducer, RelayWaker, Wait};
    pub use Queue_impl::relay_queue; // re-export for stable path
}
