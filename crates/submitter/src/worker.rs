//! Submitter - bounded queue drained by a fixed pool of HTTP workers

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use contracts::{ContractError, Payload, Submit};
use observability::{SubmissionStats, SubmissionSummary, SubmitStatus};
use reqwest::header::CONTENT_TYPE;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, instrument};

use crate::client::redact_endpoint;
use crate::error::SubmitError;

/// Submitter settings
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Payloads that may wait for a worker; 0 is a hand-off
    pub queue_depth: usize,
    /// Fully resolved write URL
    pub endpoint: String,
    /// Dump failed requests and responses
    pub debug: bool,
}

/// Starts the worker pool
pub struct Submitter;

impl Submitter {
    /// Spawn `config.workers` workers and return the queue handle
    ///
    /// Workers live as long as at least one handle does.
    pub fn spawn(config: SubmitterConfig, client: reqwest::Client) -> SubmitterHandle {
        let workers = config.workers.max(1);
        // async-channel has no rendezvous mode: with depth 0 a submitter must
        // first claim an idle worker, which keeps the single slot empty
        let idle_workers =
            (config.queue_depth == 0).then(|| Arc::new(Semaphore::new(workers)));
        let (tx, rx) = async_channel::bounded(config.queue_depth.max(1));
        let stats = Arc::new(Mutex::new(SubmissionStats::new()));
        let endpoint: Arc<str> = Arc::from(config.endpoint.as_str());

        info!(
            workers = config.workers,
            queue_depth = config.queue_depth,
            endpoint = %redact_endpoint(&config.endpoint),
            "Starting submitter"
        );

        for id in 0..workers {
            let worker = Worker {
                id,
                client: client.clone(),
                endpoint: Arc::clone(&endpoint),
                debug: config.debug,
                stats: Arc::clone(&stats),
            };
            tokio::spawn(worker.run(rx.clone()));
        }

        SubmitterHandle {
            tx,
            idle_workers,
            stats,
        }
    }
}

/// Cloneable entry point into the worker pool
#[derive(Clone)]
pub struct SubmitterHandle {
    tx: async_channel::Sender<Job>,
    /// Present only for a hand-off queue (depth 0)
    idle_workers: Option<Arc<Semaphore>>,
    stats: Arc<Mutex<SubmissionStats>>,
}

/// Queued payload plus the worker claim taken for it, if any
struct Job {
    payload: Payload,
    _claim: Option<OwnedSemaphorePermit>,
}

impl SubmitterHandle {
    /// Outcome counters so far
    pub fn stats(&self) -> SubmissionSummary {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary()
    }

    /// Payloads waiting for a worker
    pub fn queued(&self) -> usize {
        self.tx.len()
    }
}

impl Submit for SubmitterHandle {
    async fn submit(&self, payload: Payload) -> Result<(), ContractError> {
        let lines = payload.lines();
        let claim = match &self.idle_workers {
            Some(idle) => Some(
                Arc::clone(idle)
                    .acquire_owned()
                    .await
                    .map_err(|_| ContractError::SubmitQueueClosed { lines })?,
            ),
            None => None,
        };
        self.tx
            .send(Job {
                payload,
                _claim: claim,
            })
            .await
            .map_err(|_| ContractError::SubmitQueueClosed { lines })
    }
}

struct Worker {
    id: usize,
    client: reqwest::Client,
    endpoint: Arc<str>,
    debug: bool,
    stats: Arc<Mutex<SubmissionStats>>,
}

impl Worker {
    #[instrument(name = "submit_worker", skip_all, fields(worker = self.id))]
    async fn run(self, rx: async_channel::Receiver<Job>) {
        debug!("Submit worker started");

        while let Ok(Job { payload, _claim }) = rx.recv().await {
            let bytes = payload.len();
            let lines = payload.lines();
            let started = Instant::now();

            let result = self.post(payload.into_body()).await;
            let latency = started.elapsed();

            let status = match &result {
                Ok(()) => {
                    debug!(lines, bytes, ?latency, "Batch submitted");
                    SubmitStatus::Success
                }
                Err(e) => {
                    error!(lines, bytes, error = %e, "Failed to submit batch, dropping it");
                    e.status()
                }
            };
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .update(status, bytes, latency);
        }

        debug!("Submit queue closed, worker exiting");
    }

    async fn post(&self, body: Bytes) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(&*self.endpoint)
            .header(CONTENT_TYPE, "text/plain")
            .body(body.clone())
            .send()
            .await
            .map_err(|e| {
                self.dump_request(&body);
                SubmitError::Transport(e)
            })?;

        let status = response.status();
        if status.is_success() {
            // Drain so the connection can be reused
            response.bytes().await.map_err(SubmitError::Body)?;
            return Ok(());
        }

        let headers = format!("{:?}", response.headers());
        let text = response.text().await.unwrap_or_default();
        if self.debug {
            self.dump_request(&body);
            debug!(
                status = status.as_u16(),
                headers = %headers,
                body = %text,
                "Failed response"
            );
        }
        Err(SubmitError::Status {
            status: status.as_u16(),
            body: text,
        })
    }

    fn dump_request(&self, body: &Bytes) {
        if !self.debug {
            return;
        }
        debug!(
            method = "POST",
            url = %redact_endpoint(&self.endpoint),
            content_type = "text/plain",
            body = %String::from_utf8_lossy(body),
            "Failed request"
        );
    }
}
