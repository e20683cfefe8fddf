//! Command - one supervised child process

use serde::{Deserialize, Serialize};
use std::fmt;

/// A child command to run and keep running
///
/// Immutable once built; one supervisor per command for the whole agent lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Program name or path
    pub name: String,

    /// Arguments, in order
    #[serde(default)]
    pub args: Vec<String>,

    /// Only stdout lines starting with this prefix enter the pipeline
    #[serde(default)]
    pub prefix: Option<String>,
}

impl Command {
    /// Create a command without arguments
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            prefix: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the line prefix filter; an empty prefix disables filtering
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
