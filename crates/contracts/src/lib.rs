//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the agent.
//! Business crates only depend on this crate, never on each other's internals.
//!
//! ## Data Model
//! - A [`Command`] is one child process to supervise
//! - A line is an opaque `String` read from a child's stdout
//! - A [`Payload`] is a flushed batch handed to the submitter
//! - [`LineSink`] and [`Submit`] are the seams between pipeline stages

mod command;
mod config;
mod error;
mod payload;
mod sink;
mod submit;
mod supervision;

pub use command::Command;
pub use config::*;
pub use error::*;
pub use payload::Payload;
pub use sink::*;
pub use submit::*;
pub use supervision::*;
