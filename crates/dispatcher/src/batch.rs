//! BatchAccumulator - size/time bounded line buffer
//!
//! Pure state machine, no I/O. The owning sink feeds it lines and timer
//! ticks and forwards whatever payload comes back.

use contracts::Payload;

/// Line buffer flushed when full or on a timer tick
///
/// A capacity-triggered flush suppresses the next tick once, so a flush
/// caused by a full batch is not immediately followed by a timer flush of the
/// few lines that arrived right after it.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    batch: Vec<String>,
    skip_tick: bool,
}

impl BatchAccumulator {
    /// Create an empty accumulator; a zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            batch: Vec::with_capacity(capacity),
            skip_tick: false,
        }
    }

    /// Max lines per batch
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines currently buffered
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Whether the next tick will be ignored
    pub fn skips_next_tick(&self) -> bool {
        self.skip_tick
    }

    /// Append a line, flushing the full batch first
    pub fn push(&mut self, line: String) -> Option<Payload> {
        let flushed = if self.batch.len() >= self.capacity {
            self.skip_tick = true;
            Some(self.take())
        } else {
            None
        };
        self.batch.push(line);
        flushed
    }

    /// Timer tick: flush a non-empty batch unless this tick is suppressed
    pub fn tick(&mut self) -> Option<Payload> {
        if self.skip_tick {
            self.skip_tick = false;
            return None;
        }
        if self.batch.is_empty() {
            return None;
        }
        Some(self.take())
    }

    /// Flush whatever is buffered, ignoring the tick state
    pub fn drain(&mut self) -> Option<Payload> {
        if self.batch.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Payload {
        Payload::from_lines(self.batch.drain(..))
    }
}
