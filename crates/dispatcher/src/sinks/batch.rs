//! BatchSink - groups lines into payloads and hands them to a submitter

use std::time::Duration;

use contracts::{ContractError, LineSink, Payload, Submit};
use tracing::{debug, instrument};

use crate::batch::BatchAccumulator;

/// Sink that batches lines by count and time before submission
pub struct BatchSink<S> {
    name: String,
    acc: BatchAccumulator,
    interval: Duration,
    submitter: S,
}

impl<S: Submit + Sync> BatchSink<S> {
    /// Create a new BatchSink
    ///
    /// `capacity` lines trigger a flush on the following line; `interval` is
    /// the timer period for partial batches.
    pub fn new(name: impl Into<String>, capacity: usize, interval: Duration, submitter: S) -> Self {
        Self {
            name: name.into(),
            acc: BatchAccumulator::new(capacity),
            interval,
            submitter,
        }
    }

    /// Lines waiting for the next flush
    pub fn pending(&self) -> usize {
        self.acc.len()
    }

    async fn submit(&self, payload: Payload, reason: &'static str) -> Result<(), ContractError> {
        debug!(
            sink = %self.name,
            lines = payload.lines(),
            bytes = payload.len(),
            reason,
            "Flushing batch"
        );
        observability::record_batch_flushed(reason, payload.lines());
        self.submitter.submit(payload).await
    }
}

impl<S: Submit + Sync> LineSink for BatchSink<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    async fn write(&mut self, line: String) -> Result<(), ContractError> {
        match self.acc.push(line) {
            Some(payload) => self.submit(payload, "size").await,
            None => Ok(()),
        }
    }

    async fn tick(&mut self) -> Result<(), ContractError> {
        match self.acc.tick() {
            Some(payload) => self.submit(payload, "timer").await,
            None => Ok(()),
        }
    }

    #[instrument(name = "batch_sink_flush", skip(self), fields(sink = %self.name))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        match self.acc.drain() {
            Some(payload) => self.submit(payload, "shutdown").await,
            None => Ok(()),
        }
    }

    #[instrument(name = "batch_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "BatchSink closed");
        Ok(())
    }
}
