pub mod backpressure;
pub mod futex;

pub use backpressure::Gate;
pub use futex::Signal;
