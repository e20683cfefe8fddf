//! LineSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for line consumers.

use std::time::Duration;

use crate::ContractError;

/// Line consumer trait
///
/// Every sink is driven by exactly one worker task, so implementations own
/// their state without locking.
#[trait_variant::make(LineSink: Send)]
pub trait LocalLineSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Period of [`tick`](LocalLineSink::tick) calls, `None` for untimed sinks
    fn tick_interval(&self) -> Option<Duration>;

    /// Accept one line
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, line: String) -> Result<(), ContractError>;

    /// Timer fired
    async fn tick(&mut self) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
