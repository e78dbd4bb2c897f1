//! Fleet Orchestrator - drives one fleet run from validation to teardown.
//!
//! # State Machine
//!
//! ```text
//! Validating ──► ConfiguringEnvironment ──► StartingSession ──► Launching
//!     │            (skipped when headless)   (skipped when headless)   │
//!     │                                                                ▼
//!     └─(InvalidRequest / MissingDependency)──► Terminated    Running (unless
//!                                                  ▲          cancelled while
//!                                                  │          launching)
//!                                             CleaningUp ◄────────┘
//! ```
//!
//! Once the session is started, every path leads through `CleaningUp`
//! exactly once: all launched instances are stopped, then the session is
//! shut down.

use crate::environment::EnvironmentConfigurator;
use crate::error::FleetError;
use crate::grid::{format_rows, GridCell, GridLayout};
use crate::launcher::{InstanceHandle, InstanceLauncher, InstanceStatus};
use crate::request::{FleetPaths, FleetRequest, LauncherConfig};
use crate::session::{SimulatorSession, SimulatorSessionManager, SpinExit};
use fleet_env::{CancelToken, CommandExecutor};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FleetState {
    Validating,
    ConfiguringEnvironment,
    StartingSession,
    Launching,
    Running,
    CleaningUp,
    Terminated,
}

/// Outcome of a completed fleet run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetReport {
    pub layout: GridLayout,

    /// Instances for which a launch was attempted
    pub launched: usize,

    /// Instances whose launch failed
    pub launch_failures: usize,

    /// Instances stopped cleanly during cleanup
    pub stopped: usize,

    /// Stop or shutdown commands that failed during cleanup
    pub cleanup_failures: usize,

    /// Cancellation arrived before every cell was launched
    pub interrupted_launch: bool,

    /// The simulator exited on its own instead of being cancelled
    pub simulator_exited: bool,
}

/// Top-level coordinator for one fleet run.
pub struct FleetOrchestrator<E: CommandExecutor> {
    launcher: InstanceLauncher<E>,
    sessions: SimulatorSessionManager<E>,
    paths: FleetPaths,
    config: LauncherConfig,
    state: FleetState,
    handles: Vec<InstanceHandle>,
    launch_failures: usize,
    cleaned_up: bool,
}

impl<E: CommandExecutor> FleetOrchestrator<E> {
    pub fn new(executor: Arc<E>, paths: FleetPaths, config: LauncherConfig) -> Self {
        Self {
            launcher: InstanceLauncher::new(executor.clone(), paths.clone(), config.clone()),
            sessions: SimulatorSessionManager::new(executor, paths.clone(), config.clone()),
            paths,
            config,
            state: FleetState::Validating,
            handles: Vec::new(),
            launch_failures: 0,
            cleaned_up: false,
        }
    }

    pub fn state(&self) -> FleetState {
        self.state
    }

    /// Instances created so far, in launch order.
    pub fn handles(&self) -> &[InstanceHandle] {
        &self.handles
    }

    fn reset(&mut self) {
        self.handles.clear();
        self.launch_failures = 0;
        self.cleaned_up = false;
    }

    fn transition(&mut self, next: FleetState) {
        debug!("fleet state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Validates the request and the integrations it needs.
    ///
    /// # Errors
    /// * `InvalidRequest` - request invariants violated
    /// * `MissingDependency` - simulator-coupled mode without the simulator
    pub fn validate(&mut self, request: &FleetRequest) -> Result<GridLayout, FleetError> {
        self.transition(FleetState::Validating);
        request.validate()?;
        if !request.headless() {
            let launcher = self.sessions.check_available()?;
            debug!("simulator launcher found at {}", launcher.display());
        }

        let layout = GridLayout::plan(request.count());
        info!(
            "{} copters will be arranged to 2D array with xn = {}, yn = {}",
            request.count(),
            layout.columns,
            layout.rows
        );
        Ok(layout)
    }

    /// Runs the whole fleet until `cancel` fires, then tears it down.
    ///
    /// Each call is a fresh run: handles and counters of a previous run are
    /// discarded, and cleanup runs once for this call.
    ///
    /// Returns an error only for failures before anything was started
    /// (validation, missing dependency, simulator failing to start).
    pub async fn run(&mut self, request: &FleetRequest, cancel: CancelToken) -> Result<FleetReport, FleetError> {
        self.reset();
        let layout = match self.validate(request) {
            Ok(layout) => layout,
            Err(e) => {
                self.transition(FleetState::Terminated);
                return Err(e);
            }
        };

        let mut session = None;
        if !request.headless() {
            self.transition(FleetState::ConfiguringEnvironment);
            let mut configurator = EnvironmentConfigurator::from_process();
            configurator.configure_simulator(&self.paths);
            let environment = configurator.finish();

            self.transition(FleetState::StartingSession);
            match self.sessions.start(environment).await {
                Ok(started) => session = Some(started),
                Err(e) => {
                    self.transition(FleetState::Terminated);
                    return Err(e);
                }
            }
        }

        self.transition(FleetState::Launching);
        let cells: Vec<GridCell> = layout.cells(request.count(), request.spacing()).collect();
        let interrupted_launch = self.launch_all(&cells, request, session.as_ref(), &cancel).await;

        let mut simulator_exited = false;
        if !interrupted_launch {
            self.transition(FleetState::Running);
            for handle in &mut self.handles {
                if handle.status == InstanceStatus::Starting {
                    handle.status = InstanceStatus::Running;
                }
            }
            simulator_exited = self.wait(session.as_mut(), &cancel).await;
        }

        let (stopped, cleanup_failures) = self.cleanup(session.as_mut()).await;
        self.transition(FleetState::Terminated);

        Ok(FleetReport {
            layout,
            launched: self.handles.len(),
            launch_failures: self.launch_failures,
            stopped,
            cleanup_failures,
            interrupted_launch,
            simulator_exited,
        })
    }

    /// Launches one instance per cell in grid order. Returns true when
    /// cancellation cut the launch short.
    async fn launch_all(
        &mut self,
        cells: &[GridCell],
        request: &FleetRequest,
        session: Option<&SimulatorSession>,
        cancel: &CancelToken,
    ) -> bool {
        for cell in cells {
            if cancel.is_cancelled() {
                info!("Cancelled after launching {} of {} instances", self.handles.len(), cells.len());
                return true;
            }
            let handle = self.launcher.launch(cell, request, session).await;
            if handle.status == InstanceStatus::Failed {
                self.launch_failures += 1;
            }
            self.handles.push(handle);
        }

        info!("Generated copters:");
        for line in format_rows(cells, &self.config.container_prefix) {
            info!("{}", line);
        }
        false
    }

    /// Suspends until cancellation. Returns true if the simulator exited
    /// on its own instead.
    async fn wait(&mut self, session: Option<&mut SimulatorSession>, cancel: &CancelToken) -> bool {
        match session {
            Some(session) => {
                matches!(self.sessions.spin(session, cancel).await, SpinExit::SimulatorExited(_))
            }
            None => {
                while !cancel.is_cancelled() {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                false
            }
        }
    }

    /// Stops every instance, then the session. Runs at most once.
    ///
    /// Returns `(stopped, failures)`.
    async fn cleanup(&mut self, session: Option<&mut SimulatorSession>) -> (usize, usize) {
        if self.cleaned_up {
            return (0, 0);
        }
        self.cleaned_up = true;
        self.transition(FleetState::CleaningUp);

        let mut stopped = 0;
        let mut failures = 0;

        info!("Clear containers:");
        for handle in self.handles.iter_mut().rev() {
            match self.launcher.stop(handle).await {
                Ok(()) => stopped += 1,
                Err(e) => {
                    error!("{}", e);
                    failures += 1;
                }
            }
        }

        if let Some(session) = session {
            if let Err(e) = self.sessions.shutdown(session).await {
                error!("{}", e);
                failures += 1;
            }
        }
        info!("Cleared!");

        (stopped, failures)
    }
}
