//! # Submitter
//!
//! Worker pool that POSTs batch payloads to one HTTP endpoint.
//!
//! Submission is best-effort: a failed request is logged (and dumped in
//! debug mode) and its payload is dropped. Callers only see whether the
//! payload made it into the queue.

mod client;
mod error;
mod worker;

pub use client::{build_client, redact_endpoint};
pub use error::SubmitError;
pub use worker::{Submitter, SubmitterConfig, SubmitterHandle};
