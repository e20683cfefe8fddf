//! Sink implementations
//!
//! Contains BatchSink and PassthroughSink.

mod batch;
mod passthrough;

pub use self::batch::BatchSink;
pub use self::passthrough::PassthroughSink;
