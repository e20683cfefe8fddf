//! # Supervisor
//!
//! Child process supervision.
//!
//! Responsibilities:
//! - Spawn each [`Command`](contracts::Command) with piped stdio
//! - Feed stdout lines into the shared [`Router`](dispatcher::Router)
//! - Copy stderr lines to the operator's stderr
//! - Restart or terminate according to a [`RestartPolicy`](contracts::RestartPolicy)

mod error;
mod lines;
mod supervisor;

pub use contracts::{RestartPolicy, RunOutcome, SupervisorState};
pub use error::SupervisorError;
pub use lines::{route_line, LineRoute};
pub use supervisor::{run_all, run_all_until, Supervisor};
