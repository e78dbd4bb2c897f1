//! Instance Launcher - starts and stops one vehicle execution unit.

use crate::error::FleetError;
use crate::grid::GridCell;
use crate::request::{FleetPaths, FleetRequest, LauncherConfig};
use crate::session::SimulatorSession;
use fleet_env::{CommandExecutor, CommandSpec};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle status of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstanceStatus {
    /// Start command issued, readiness unknown
    Starting,
    /// The fleet reached its running phase with this instance started
    Running,
    /// Torn down during cleanup
    Stopped,
    /// A launch or stop command failed
    Failed,
}

/// Handle to one launched instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceHandle {
    /// 1-based instance index
    pub index: u32,

    /// Backing container name
    pub unit: String,

    /// UDP port (simulator-coupled mode only)
    pub port: Option<u32>,

    /// Grid placement
    pub cell: GridCell,

    pub status: InstanceStatus,
}

/// Starts instances through a `CommandExecutor`.
pub struct InstanceLauncher<E: CommandExecutor> {
    executor: Arc<E>,
    paths: FleetPaths,
    config: LauncherConfig,
}

impl<E: CommandExecutor> InstanceLauncher<E> {
    pub fn new(executor: Arc<E>, paths: FleetPaths, config: LauncherConfig) -> Self {
        Self {
            executor,
            paths,
            config,
        }
    }

    /// Command that starts the instance for `cell`.
    ///
    /// Headless: `run -i=<index> --dx=<x> --dy=<y> --headless`.
    /// Simulator-coupled: `run -i=<index> -p=<port>`.
    pub fn start_command(&self, cell: &GridCell, request: &FleetRequest) -> CommandSpec {
        let command = CommandSpec::new(self.paths.run_script.display().to_string())
            .arg(format!("-i={}", cell.index));

        if request.headless() {
            command
                .arg(format!("--dx={}", cell.x))
                .arg(format!("--dy={}", cell.y))
                .arg("--headless")
        } else {
            command.arg(format!("-p={}", request.port_for(cell.index)))
        }
    }

    /// Command that stops instance `index`: `<runtime> kill sim-<index>`.
    pub fn stop_command(&self, index: u32) -> CommandSpec {
        CommandSpec::new(&self.config.runtime)
            .arg("kill")
            .arg(self.config.container_name(index))
    }

    /// Launches the instance for `cell`.
    ///
    /// Never fails the fleet: a failing sub-step is logged and reflected as
    /// `InstanceStatus::Failed` in the returned handle. In
    /// simulator-coupled mode the model spawn is issued after the start
    /// command, even if the start command failed.
    pub async fn launch(
        &self,
        cell: &GridCell,
        request: &FleetRequest,
        session: Option<&SimulatorSession>,
    ) -> InstanceHandle {
        let mut handle = InstanceHandle {
            index: cell.index,
            unit: self.config.container_name(cell.index),
            port: (!request.headless()).then(|| request.port_for(cell.index)),
            cell: *cell,
            status: InstanceStatus::Starting,
        };

        let start = self.start_command(cell, request);
        if let Err(e) = self.run_step(cell.index, &start).await {
            warn!("{}", e);
            handle.status = InstanceStatus::Failed;
        }

        if !request.headless() {
            let port = request.port_for(cell.index);
            match session {
                Some(session) => {
                    let spawn = session.model_spawn_command(cell.index, port, cell.x, cell.y);
                    if let Err(e) = self.run_step(cell.index, &spawn).await {
                        warn!("{}", e);
                        handle.status = InstanceStatus::Failed;
                    }
                }
                None => {
                    warn!("No simulator session to spawn the model of instance {}", cell.index);
                    handle.status = InstanceStatus::Failed;
                }
            }
        }

        info!("{} ({}, {}) {:?}", handle.unit, cell.x, cell.y, handle.status);
        handle
    }

    async fn run_step(&self, index: u32, command: &CommandSpec) -> Result<(), FleetError> {
        debug!("instance {}: {}", index, command);
        self.executor
            .run(command)
            .await
            .and_then(|report| report.into_result(&command.program))
            .map_err(|source| FleetError::InstanceLaunch { index, source })
    }

    /// Stops one instance, best-effort.
    ///
    /// On success the handle becomes `Stopped`; on failure it becomes
    /// `Failed` and the error is returned for the caller to log.
    pub async fn stop(&self, handle: &mut InstanceHandle) -> Result<(), FleetError> {
        let command = self.stop_command(handle.index);
        debug!("instance {}: {}", handle.index, command);

        let result = self
            .executor
            .run(&command)
            .await
            .and_then(|report| report.into_result(&command.program));

        match result {
            Ok(()) => {
                handle.status = InstanceStatus::Stopped;
                Ok(())
            }
            Err(e) => {
                handle.status = InstanceStatus::Failed;
                Err(FleetError::cleanup(handle.unit.clone(), e))
            }
        }
    }
}
