//! Router - synchronous fan-out of lines to every sink

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::SinkReport;

/// Broadcasts each line to every registered sink
///
/// Cheap to clone: every supervisor holds a clone of the same router. A
/// delivery only completes once every sink queue has accepted the line, so
/// a slow sink throttles all producers.
#[derive(Clone)]
pub struct Router {
    handles: Arc<Vec<SinkHandle>>,
}

impl Router {
    /// Create a router over the given sinks
    ///
    /// # Errors
    /// [`DispatcherError::NoSinksConfigured`] when `handles` is empty
    #[instrument(name = "router_new", skip(handles), fields(sink_count = handles.len()))]
    pub fn new(handles: Vec<SinkHandle>) -> Result<Self, DispatcherError> {
        if handles.is_empty() {
            return Err(DispatcherError::NoSinksConfigured);
        }
        info!(
            sinks = ?handles.iter().map(SinkHandle::name).collect::<Vec<_>>(),
            "Router created"
        );
        Ok(Self {
            handles: Arc::new(handles),
        })
    }

    /// Number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Deliver one line to every sink, in registration order
    ///
    /// A sink whose worker is gone is logged and skipped; the remaining sinks
    /// still receive the line.
    pub async fn deliver(&self, line: String) {
        let Some((last, rest)) = self.handles.split_last() else {
            return;
        };
        for handle in rest {
            if let Err(e) = handle.send(line.clone()).await {
                warn!(error = %e, "Delivery failed");
            }
        }
        if let Err(e) = last.send(line).await {
            warn!(error = %e, "Delivery failed");
        }
        observability::record_line_routed();
    }

    /// Forward one process's line stream until it ends
    ///
    /// Returns the number of lines delivered.
    #[instrument(name = "router_forward", skip(self, rx))]
    pub async fn forward(&self, mut rx: mpsc::Receiver<String>) -> u64 {
        let mut line_count: u64 = 0;

        while let Some(line) = rx.recv().await {
            self.deliver(line).await;
            line_count += 1;

            if line_count % 1000 == 0 {
                debug!(lines = line_count, "Router progress");
            }
        }

        debug!(lines = line_count, "Line stream ended");
        line_count
    }

    /// Stop every sink worker, flushing what they buffer
    ///
    /// Only effective on the last clone; other clones keep the sinks alive.
    /// Returns each sink's counters as of the moment its worker stopped.
    #[instrument(name = "router_shutdown", skip(self))]
    pub async fn shutdown(self) -> Vec<(String, SinkReport)> {
        match Arc::try_unwrap(self.handles) {
            Ok(handles) => {
                let mut reports = Vec::with_capacity(handles.len());
                for handle in handles {
                    reports.push(handle.shutdown().await);
                }
                info!("Router shutdown complete");
                reports
            }
            Err(handles) => {
                warn!("Router still shared, sinks left running");
                handles
                    .iter()
                    .map(|h| (h.name().to_string(), h.counters().report()))
                    .collect()
            }
        }
    }
}
