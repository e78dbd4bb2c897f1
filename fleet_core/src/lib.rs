//! Fleet Core - launches a grid of simulated vehicles and tears it down.
//!
//! This library holds the orchestration logic of the fleet launcher:
//! 1. **Placement**: near-square grid layout for N instances (`grid`)
//! 2. **Environment**: search paths and home position for the simulator (`environment`)
//! 3. **Lifecycle**: instance start/stop, simulator session, cancellation-driven cleanup
//!
//! All host interaction goes through `fleet_env::CommandExecutor`, so the
//! same orchestrator drives real containers or a recorder.

pub mod environment;
pub mod error;
pub mod grid;
pub mod launcher;
pub mod orchestrator;
pub mod request;
pub mod session;

// Re-export key types for convenience
pub use environment::{EnvironmentConfig, EnvironmentConfigurator};
pub use error::FleetError;
pub use grid::{GridCell, GridLayout};
pub use launcher::{InstanceHandle, InstanceLauncher, InstanceStatus};
pub use orchestrator::{FleetOrchestrator, FleetReport, FleetState};
pub use request::{FleetPaths, FleetRequest, LauncherConfig, DEFAULT_BASE_PORT};
pub use session::{SimulatorSession, SimulatorSessionManager, SpinExit, SpinState};
