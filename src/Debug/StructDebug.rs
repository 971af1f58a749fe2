use std::fmt;

use crate::Relay::Queue::{RelayConsumer, RelayProducer};
use crate::Relay::{Dispatcher, DispatcherConfig};

/// Debug function for RelayProducer
///
/// Shows the counters and closed flag; never walks the chain.
pub fn debug_relay_producer<T>(producer: &RelayProducer<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RelayProducer")
        .field("tail", &format_args!("{:p}", producer.tail))
        .field("input", &producer.input_count())
        .field("output", &producer.output_count())
        .field("closed", &producer.is_closed())
        .finish()
}

/// Debug function for RelayConsumer
pub fn debug_relay_consumer<T>(consumer: &RelayConsumer<T>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RelayConsumer")
        .field("head", &format_args!("{:p}", consumer.head))
        .field("input", &consumer.input_count())
        .field("output", &consumer.output_count())
        .field("drained", &consumer.is_empty_and_closed())
        .finish()
}

/// Debug function for DispatcherConfig
///
/// The error policy is a trait object and is shown opaquely.
pub fn debug_dispatcher_config(config: &DispatcherConfig, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DispatcherConfig")
        .field("limit", &config.limit)
        .field("thread_name", &config.thread_name)
        .field("spin_limit", &config.spin_limit)
        .field("error_policy", &"<dyn ErrorPolicy>")
        .finish()
}

/// Debug function for Dispatcher
///
/// Shows phase and progress; the handler is not required to be Debug.
pub fn debug_dispatcher<H, C>(dispatcher: &Dispatcher<H, C>, f: &mut fmt::Formatter<'_>) -> fmt::Result
where
    H: crate::Relay::RecordHandler<C>,
    C: crate::Relay::Context + Clone,
{
    f.debug_struct("Dispatcher")
        .field("phase", &dispatcher.phase())
        .field("limit", &dispatcher.limit())
        .field("processed", &dispatcher.processed())
        .field("pending", &dispatcher.pending())
        .finish_non_exhaustive()
}
