//! SinkHandle - manages a sink with its own bounded queue and worker task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, instrument};

use contracts::LineSink;

use crate::error::DispatcherError;
use crate::metrics::{SinkCounters, SinkReport};

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send lines to worker
    tx: mpsc::Sender<String>,
    /// Counters shared with the worker
    counters: Arc<SinkCounters>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    ///
    /// `queue_capacity` bounds how many lines may wait for a slow sink before
    /// senders start waiting.
    pub fn spawn<S: LineSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let counters = Arc::new(SinkCounters::new());

        let worker_counters = Arc::clone(&counters);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_counters, worker_name).await;
        });

        Self {
            name,
            tx,
            counters,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn counters(&self) -> &SinkCounters {
        &self.counters
    }

    /// Send a line to the sink, waiting while its queue is full
    ///
    /// # Errors
    /// [`DispatcherError::SinkClosed`] if the worker has stopped
    pub async fn send(&self, line: String) -> Result<(), DispatcherError> {
        self.tx
            .send(line)
            .await
            .map_err(|_| DispatcherError::sink_closed(&self.name))?;
        self.counters
            .observe_queue(self.tx.max_capacity() - self.tx.capacity());
        Ok(())
    }

    /// Shutdown the sink worker gracefully, returning its final counters
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> (String, SinkReport) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
        (self.name, self.counters.report())
    }
}

/// Ticker for timed sinks; the first tick fires one period after start
fn make_ticker(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Worker task that consumes lines and timer ticks
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, counters),
    fields(sink = %name)
)]
async fn sink_worker<S: LineSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<String>,
    counters: Arc<SinkCounters>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    let mut ticker = sink.tick_interval().map(make_ticker);

    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                counters.observe_queue(rx.len());

                match sink.write(line).await {
                    Ok(()) => counters.line_written(),
                    Err(e) => {
                        counters.write_failed();
                        error!(sink = %name, error = %e, "Write failed");
                        // Continue processing - don't crash on single failure
                    }
                }
            }
            _ = next_tick(&mut ticker) => {
                let result = sink.tick().await;
                counters.ticked(result.is_ok());
                if let Err(e) = result {
                    error!(sink = %name, error = %e, "Tick failed");
                }
            }
        }
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
