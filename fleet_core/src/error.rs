//! Error types for fleet orchestration.

use fleet_env::EnvError;
use thiserror::Error;

/// Errors surfaced by the fleet orchestration layer.
///
/// Only `InvalidRequest`, `MissingDependency` and session start failures
/// abort a run. Launch and cleanup failures are logged and counted in the
/// `FleetReport`; they are never escalated.
#[derive(Debug, Error)]
pub enum FleetError {
    /// Bad request value, rejected before any side effect
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A required external integration is unavailable
    #[error("missing dependency: {0}")]
    MissingDependency(String),

    /// Starting an instance or spawning its model failed
    #[error("instance {index} failed to launch: {source}")]
    InstanceLaunch {
        index: u32,
        #[source]
        source: EnvError,
    },

    /// Stopping an instance or the session failed
    #[error("cleanup of {what} failed: {source}")]
    Cleanup {
        what: String,
        #[source]
        source: EnvError,
    },

    /// Any other environment failure (e.g. the simulator would not start)
    #[error(transparent)]
    Env(#[from] EnvError),
}

impl FleetError {
    /// Creates an invalid-request error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a cleanup error for the named resource.
    pub fn cleanup(what: impl Into<String>, source: EnvError) -> Self {
        Self::Cleanup {
            what: what.into(),
            source,
        }
    }
}
