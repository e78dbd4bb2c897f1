//! Error types for the fleet environment abstraction.

use std::io;
use thiserror::Error;

/// Errors that can occur while talking to the host.
#[derive(Debug, Error)]
pub enum EnvError {
    /// The program could not be started at all
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The program ran but reported failure
    #[error("`{program}` exited with {status}")]
    Exit { program: String, status: String },

    /// A signal could not be delivered to a child process
    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// The executor refused the command (recorded runs, injected faults)
    #[error("command rejected: {0}")]
    Rejected(String),

    /// Any other I/O failure while supervising a process
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EnvError {
    /// Creates a spawn error for the given program.
    pub fn spawn(program: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Creates a rejection error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
