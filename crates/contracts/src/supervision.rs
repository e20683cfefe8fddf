//! Supervision state machine shared by the config layer and the supervisor

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a supervisor does once its child is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Relaunch after any exit or supervision error
    #[default]
    Always,
    /// Relaunch after a clean exit, terminate the agent on any failure
    OnCleanExit,
    /// Run the child once
    Never,
}

impl RestartPolicy {
    /// Policy selected by the `fatal` flag
    pub fn from_fatal(fatal: bool) -> Self {
        if fatal {
            Self::OnCleanExit
        } else {
            Self::Always
        }
    }

    /// Whether a failed run ends the whole agent
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::OnCleanExit)
    }

    /// Next state once a run of the child is over
    ///
    /// Only ever yields [`SupervisorState::Restarting`] or
    /// [`SupervisorState::Terminated`].
    pub fn decide(self, outcome: RunOutcome) -> SupervisorState {
        let restart = match self {
            Self::Always => true,
            Self::OnCleanExit => !outcome.is_failure(),
            Self::Never => false,
        };
        if restart {
            SupervisorState::Restarting
        } else {
            SupervisorState::Terminated
        }
    }
}

/// How one run of a child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exit status zero
    Clean,
    /// Non-zero exit code, or `None` when killed by a signal
    Abnormal(Option<i32>),
    /// The exit status could not be retrieved
    WaitFailed,
    /// Spawn failed or a stdio pipe was missing
    StartFailed,
}

impl RunOutcome {
    /// Outcomes that terminate the agent in fatal mode
    ///
    /// A lost exit status is not a failure: the child may well have been fine.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Abnormal(_) | Self::StartFailed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "exited cleanly"),
            Self::Abnormal(Some(code)) => write!(f, "exited with status {code}"),
            Self::Abnormal(None) => write!(f, "terminated by signal"),
            Self::WaitFailed => write!(f, "exit status unavailable"),
            Self::StartFailed => write!(f, "failed to start"),
        }
    }
}

/// Lifecycle of one supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Exited(RunOutcome),
    Restarting,
    Terminated,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }
}
