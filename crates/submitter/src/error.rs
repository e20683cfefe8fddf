//! Submission error types

use thiserror::Error;

/// Why one POST failed
#[derive(Debug, Error)]
pub enum SubmitError {
    /// No response (connect, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Endpoint answered outside 2xx
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be read
    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),

    /// Client settings rejected (TLS backend, timeout)
    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl SubmitError {
    pub fn status(&self) -> observability::SubmitStatus {
        match self {
            Self::Status { .. } => observability::SubmitStatus::Rejected,
            Self::Transport(_) | Self::Body(_) | Self::Client(_) => {
                observability::SubmitStatus::Transport
            }
        }
    }
}
