//! Per-sink counters, reported when the agent stops

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared between a [`SinkHandle`](crate::SinkHandle) and its worker
#[derive(Debug, Default)]
pub struct SinkCounters {
    queued: AtomicUsize,
    peak_queued: AtomicUsize,
    lines_written: AtomicU64,
    write_failures: AtomicU64,
    tick_failures: AtomicU64,
    ticks: AtomicU64,
}

impl SinkCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines currently waiting in the sink queue; also tracks the peak
    pub(crate) fn observe_queue(&self, len: usize) {
        self.queued.store(len, Ordering::Relaxed);
        self.peak_queued.fetch_max(len, Ordering::Relaxed);
    }

    pub(crate) fn line_written(&self) {
        self.lines_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn write_failed(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn ticked(&self, ok: bool) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.tick_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Write plus tick failures
    pub fn failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed) + self.tick_failures.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> SinkReport {
        SinkReport {
            queued: self.queued.load(Ordering::Relaxed),
            peak_queued: self.peak_queued.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            tick_failures: self.tick_failures.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SinkCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub queued: usize,
    pub peak_queued: usize,
    pub lines_written: u64,
    pub write_failures: u64,
    pub tick_failures: u64,
    pub ticks: u64,
}

impl SinkReport {
    /// Push the report to the metrics facade under the sink's name
    pub fn publish(&self, sink: &str) {
        observability::record_sink_report(
            sink,
            self.lines_written,
            self.write_failures + self.tick_failures,
            self.peak_queued,
        );
    }
}

impl fmt::Display for SinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lines written, {} write failures, {} ticks ({} failed), peak queue {}",
            self.lines_written, self.write_failures, self.ticks, self.tick_failures, self.peak_queued
        )?;
        if self.queued > 0 {
            write!(f, ", {} still queued", self.queued)?;
        }
        Ok(())
    }
}
