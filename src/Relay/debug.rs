use std::fmt;

use super::builder::DispatcherConfig;
use super::context::Context;
use super::dispatcher::Dispatcher;
use super::handler::RecordHandler;
use super::Queue::{RelayConsumer, RelayProducer};

// Debug proxy implementations that call the standalone debug functions
impl<T> fmt::Debug for RelayProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_relay_producer(self, f)
    }
}

impl<T> fmt::Debug for RelayConsumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_relay_consumer(self, f)
    }
}

impl fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_dispatcher_config(self, f)
    }
}

impl<H, C> fmt::Debug for Dispatcher<H, C>
where
    H: RecordHandler<C>,
    C: Context + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_dispatcher(self, f)
    }
}
