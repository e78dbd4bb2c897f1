//! Simulator Session Manager - lifecycle of the external simulator process.
//!
//! # Lifecycle
//!
//! ```text
//!   start() ──► Running ──spin()──► (cancelled | simulator exited)
//!                  │
//!             shutdown()
//!                  ▼
//!              Stopping ──► Stopped   (further shutdown() calls are no-ops)
//! ```

use crate::environment::EnvironmentConfig;
use crate::error::FleetError;
use crate::request::{FleetPaths, LauncherConfig};
use fleet_env::{CancelToken, ChildProcess, CommandExecutor, CommandSpec, ExitReport, SessionId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Spin state of a simulator session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinState {
    Running,
    Stopping,
    Stopped,
}

/// Why `spin()` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinExit {
    /// The operator cancelled the run
    Cancelled,

    /// The simulator process exited on its own
    SimulatorExited(ExitReport),
}

/// A running simulator, owned by the orchestrator.
pub struct SimulatorSession {
    id: SessionId,
    child: Box<dyn ChildProcess>,
    state: SpinState,

    /// Set once the child has been reaped
    exited: Option<ExitReport>,

    environment: Arc<EnvironmentConfig>,
    launcher_program: String,
    spawn_launch: PathBuf,
}

impl SimulatorSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SpinState {
        self.state
    }

    /// Environment the simulator was started with.
    pub fn environment(&self) -> &EnvironmentConfig {
        &self.environment
    }

    /// Command that asks the simulator to spawn the model of instance
    /// `index` at `(x, y)`, wired to UDP `port`.
    pub fn model_spawn_command(&self, index: u32, port: u32, x: f64, y: f64) -> CommandSpec {
        CommandSpec::new(&self.launcher_program)
            .arg(self.spawn_launch.display().to_string())
            .arg(format!("ID:={}", index))
            .arg(format!("port:={}", port))
            .arg(format!("x:={}", x))
            .arg(format!("y:={}", y))
            .envs(self.environment.iter())
    }
}

impl std::fmt::Debug for SimulatorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatorSession")
            .field("id", &self.id)
            .field("pid", &self.child.id())
            .field("state", &self.state)
            .field("exited", &self.exited)
            .finish()
    }
}

/// Starts, waits on and shuts down simulator sessions.
pub struct SimulatorSessionManager<E: CommandExecutor> {
    executor: Arc<E>,
    paths: FleetPaths,
    config: LauncherConfig,
}

impl<E: CommandExecutor> SimulatorSessionManager<E> {
    pub fn new(executor: Arc<E>, paths: FleetPaths, config: LauncherConfig) -> Self {
        Self {
            executor,
            paths,
            config,
        }
    }

    /// Checks that the simulator integration is installed.
    ///
    /// # Errors
    /// `FleetError::MissingDependency` if the session launcher program is
    /// not resolvable.
    pub fn check_available(&self) -> Result<PathBuf, FleetError> {
        self.executor
            .locate(&self.config.session_launcher)
            .ok_or_else(|| {
                FleetError::MissingDependency(format!(
                    "{} is not available; check your ROS installation",
                    self.config.session_launcher
                ))
            })
    }

    /// Command that starts the simulator world.
    pub fn start_command(&self, environment: &EnvironmentConfig) -> CommandSpec {
        CommandSpec::new(&self.config.session_launcher)
            .arg(self.paths.world_launch.display().to_string())
            .envs(environment.iter())
    }

    /// Starts the simulator in the background and returns immediately.
    pub async fn start(&self, environment: EnvironmentConfig) -> Result<SimulatorSession, FleetError> {
        let command = self.start_command(&environment);
        let child = self.executor.spawn(&command).await?;
        let id = SessionId::new();

        info!("Simulator session {} started (pid {:?}): {}", id, child.id(), command);

        Ok(SimulatorSession {
            id,
            child,
            state: SpinState::Running,
            exited: None,
            environment: Arc::new(environment),
            launcher_program: self.config.session_launcher.clone(),
            spawn_launch: self.paths.spawn_launch.clone(),
        })
    }

    /// Blocks until the run is cancelled or the simulator exits.
    pub async fn spin(&self, session: &mut SimulatorSession, cancel: &CancelToken) -> SpinExit {
        if session.state != SpinState::Running || session.exited.is_some() {
            cancel.cancelled().await;
            return SpinExit::Cancelled;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Session {} spin interrupted by cancellation", session.id);
                SpinExit::Cancelled
            }
            result = session.child.wait() => {
                let report = match result {
                    Ok(report) => report,
                    Err(e) => {
                        error!("Lost track of simulator session {}: {}", session.id, e);
                        ExitReport::signalled()
                    }
                };
                warn!("Simulator session {} exited on its own ({})", session.id, report);
                session.exited = Some(report);
                SpinExit::SimulatorExited(report)
            }
        }
    }

    /// Requests graceful termination of the simulator. Idempotent.
    ///
    /// Sends an interrupt and waits up to the configured grace period,
    /// then kills. The session ends up `Stopped` even when an error is
    /// returned.
    pub async fn shutdown(&self, session: &mut SimulatorSession) -> Result<(), FleetError> {
        if session.state == SpinState::Stopped {
            debug!("Session {} already stopped", session.id);
            return Ok(());
        }
        session.state = SpinState::Stopping;
        info!("Shutting down simulator session {}", session.id);

        let result = if session.exited.is_some() {
            Ok(())
        } else {
            self.terminate(session).await
        };

        session.state = SpinState::Stopped;
        result.map_err(|e| FleetError::cleanup(format!("simulator session {}", session.id), e))
    }

    async fn terminate(&self, session: &mut SimulatorSession) -> Result<(), fleet_env::EnvError> {
        if let Err(e) = session.child.interrupt().await {
            warn!("Interrupt failed for session {} ({}), killing", session.id, e);
            session.child.kill().await?;
            session.exited = Some(ExitReport::signalled());
            return Ok(());
        }

        match tokio::time::timeout(self.config.shutdown_grace, session.child.wait()).await {
            Ok(report) => {
                session.exited = Some(report?);
                Ok(())
            }
            Err(_) => {
                warn!(
                    "Session {} still running after {:?}, killing",
                    session.id, self.config.shutdown_grace
                );
                session.child.kill().await?;
                session.exited = Some(ExitReport::signalled());
                Ok(())
            }
        }
    }
}
