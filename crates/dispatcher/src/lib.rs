//! # Dispatcher
//!
//! 行数据分发模块。
//!
//! 负责：
//! - 把每个子进程的 stdout 行广播到所有 sinks
//! - 每个 sink 独立队列 + worker 任务，慢 sink 通过背压限流整条链路
//! - 批处理 (BatchSink) 与回显 (PassthroughSink)

pub mod batch;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod router;
pub mod sinks;

pub use batch::BatchAccumulator;
pub use contracts::{LineSink, Payload, Submit};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{SinkCounters, SinkReport};
pub use router::Router;
pub use sinks::{BatchSink, PassthroughSink};
