//! Supervision error types

use std::io;

use contracts::RunOutcome;
use thiserror::Error;

/// Errors from one run of a supervised child
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The command could not be started
    #[error("cannot start command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A requested stdio pipe was not available
    #[error("cannot get {stream} for command `{command}`")]
    MissingPipe {
        command: String,
        stream: &'static str,
    },

    /// The child exited with a non-zero status or was killed
    #[error("child `{command}` exited with failure ({})", abnormal(.code))]
    AbnormalExit { command: String, code: Option<i32> },

    /// The exit status could not be collected
    #[error("error waiting for command `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

fn abnormal(code: &Option<i32>) -> RunOutcome {
    RunOutcome::Abnormal(*code)
}

impl SupervisorError {
    /// Outcome used for the restart decision
    pub fn outcome(&self) -> RunOutcome {
        match self {
            Self::Spawn { .. } | Self::MissingPipe { .. } => RunOutcome::StartFailed,
            Self::AbnormalExit { code, .. } => RunOutcome::Abnormal(*code),
            Self::Wait { .. } => RunOutcome::WaitFailed,
        }
    }
}
