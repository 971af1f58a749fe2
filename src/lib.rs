// Module naming follows project convention (Relay = record relay pipeline)
#[allow(non_snake_case)]
pub mod Relay;

#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub use Relay::{
    Context, DispatchError, Dispatcher, DispatcherBuilder, DispatcherHandle, Phase,
    ProcessingError, Record, RecordHandler, StreamContext,
};
