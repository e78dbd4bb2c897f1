//! Command execution traits for the fleet launcher.

use crate::command::{CommandSpec, ExitReport};
use crate::error::EnvError;
use async_trait::async_trait;
use std::path::PathBuf;

/// The central interface for talking to the host.
///
/// This trait abstracts process management so the orchestration logic can
/// run against real processes or against a recorder.
///
/// # Implementations
///
/// - **Production**: `TokioExecutor` - wraps `tokio::process`
/// - **Recorded**: `RecordingExecutor` (in `fleet_sim`) - records every
///   command and injects faults from a seed
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    /// Runs a command to completion and reports how it exited.
    ///
    /// # Returns
    /// * `Ok(report)` - The command ran; `report` may still be a failure
    /// * `Err(EnvError::Spawn)` - The command could not be started
    async fn run(&self, command: &CommandSpec) -> Result<ExitReport, EnvError>;

    /// Starts a command in the background and returns immediately.
    ///
    /// The returned child is supervised by the caller.
    async fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, EnvError>;

    /// Resolves a program the way `spawn()` would find it.
    ///
    /// Returns `None` when the program is not available on this host.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// A background process started through `CommandExecutor::spawn`.
#[async_trait]
pub trait ChildProcess: Send {
    /// OS process id, if the process is (or was) real.
    fn id(&self) -> Option<u32>;

    /// Waits for the process to exit.
    ///
    /// Cancel-safe: dropping the future leaves the process running.
    async fn wait(&mut self) -> Result<ExitReport, EnvError>;

    /// Asks the process to shut down gracefully (SIGINT on unix).
    async fn interrupt(&mut self) -> Result<(), EnvError>;

    /// Terminates the process immediately and reaps it.
    async fn kill(&mut self) -> Result<(), EnvError>;
}
