//! Fleet request and launcher configuration.

use crate::error::FleetError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default UDP port of the first instance.
pub const DEFAULT_BASE_PORT: u32 = 14601;

/// Highest usable UDP port.
pub const MAX_PORT: u32 = 65535;

/// A validated request to launch a fleet.
///
/// Fields are private so a `FleetRequest` can only exist in a valid state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FleetRequest {
    count: u32,
    base_port: u32,
    spacing: f64,
    headless: bool,
}

impl FleetRequest {
    /// Validates and creates a request.
    ///
    /// # Errors
    /// `FleetError::InvalidRequest` if count, port or spacing is not
    /// positive, or (simulator-coupled mode) the last instance's port
    /// would exceed 65535.
    pub fn new(count: u32, base_port: u32, spacing: f64, headless: bool) -> Result<Self, FleetError> {
        let request = Self {
            count,
            base_port,
            spacing,
            headless,
        };
        request.validate()?;
        Ok(request)
    }

    /// Re-checks every invariant of the request.
    pub fn validate(&self) -> Result<(), FleetError> {
        if self.count == 0 {
            return Err(FleetError::invalid("number of instances must be positive"));
        }
        if self.base_port == 0 {
            return Err(FleetError::invalid("port must be positive"));
        }
        if !self.spacing.is_finite() || self.spacing <= 0.0 {
            return Err(FleetError::invalid(format!(
                "{} is an invalid distance, must be positive",
                self.spacing
            )));
        }
        if !self.headless {
            let last = self.base_port as u64 + self.count as u64 - 1;
            if last > MAX_PORT as u64 {
                return Err(FleetError::invalid(format!(
                    "ports {}..={} exceed {}",
                    self.base_port, last, MAX_PORT
                )));
            }
        }
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn base_port(&self) -> u32 {
        self.base_port
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    /// UDP port of instance `index` (1-based): `base_port + index - 1`.
    pub fn port_for(&self, index: u32) -> u32 {
        self.base_port.saturating_add(index.saturating_sub(1))
    }
}

/// Filesystem layout of the launcher's collaborators.
///
/// Everything is resolved relative to one root directory: the `run` script
/// that starts an instance, and the `gazebo/` tree with plugins, models and
/// launch files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetPaths {
    /// Root directory
    pub root: PathBuf,

    /// Instance start script
    pub run_script: PathBuf,

    /// Simulator plugin directory
    pub plugins_dir: PathBuf,

    /// Simulator model directory
    pub models_dir: PathBuf,

    /// Launch file for the simulator world
    pub world_launch: PathBuf,

    /// Launch file spawning one vehicle model
    pub spawn_launch: PathBuf,
}

impl FleetPaths {
    /// Derives all collaborator paths from `root`.
    pub fn from_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let gazebo = root.join("gazebo");
        Self {
            run_script: root.join("run"),
            plugins_dir: gazebo.join("plugins"),
            models_dir: gazebo.join("models"),
            world_launch: gazebo.join("gazebo.launch"),
            spawn_launch: gazebo.join("single_vehicle_spawn.launch"),
            root,
        }
    }
}

/// Tunables for the launcher's external commands.
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    /// Container runtime used to stop instances
    pub runtime: String,

    /// Prefix of instance container names (`sim-1`, `sim-2`, ...)
    pub container_prefix: String,

    /// Program that starts the simulator and spawns models
    pub session_launcher: String,

    /// Sleep interval of the headless cancellation poll
    pub poll_interval: Duration,

    /// How long the simulator gets to exit after an interrupt
    pub shutdown_grace: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            container_prefix: "sim-".to_string(),
            session_launcher: "roslaunch".to_string(),
            poll_interval: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(15),
        }
    }
}

impl LauncherConfig {
    /// Container name of instance `index`.
    pub fn container_name(&self, index: u32) -> String {
        format!("{}{}", self.container_prefix, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let request = FleetRequest::new(4, DEFAULT_BASE_PORT, 1.0, false).unwrap();
        assert_eq!(request.count(), 4);
        assert_eq!(request.port_for(1), 14601);
        assert_eq!(request.port_for(4), 14604);
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert!(matches!(
            FleetRequest::new(0, 14601, 1.0, true),
            Err(FleetError::InvalidRequest(_))
        ));
        assert!(matches!(
            FleetRequest::new(1, 0, 1.0, true),
            Err(FleetError::InvalidRequest(_))
        ));
        assert!(matches!(
            FleetRequest::new(1, 14601, 0.0, true),
            Err(FleetError::InvalidRequest(_))
        ));
        assert!(matches!(
            FleetRequest::new(1, 14601, -2.5, true),
            Err(FleetError::InvalidRequest(_))
        ));
        assert!(matches!(
            FleetRequest::new(1, 14601, f64::NAN, true),
            Err(FleetError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_port_range_only_checked_when_coupled() {
        assert!(FleetRequest::new(2, 65535, 1.0, false).is_err());
        assert!(FleetRequest::new(1, 65535, 1.0, false).is_ok());
        // Headless instances do not use the port
        assert!(FleetRequest::new(2, 65535, 1.0, true).is_ok());
    }

    #[test]
    fn test_paths_from_root() {
        let paths = FleetPaths::from_root("/opt/fleet");
        assert_eq!(paths.run_script, PathBuf::from("/opt/fleet/run"));
        assert_eq!(paths.plugins_dir, PathBuf::from("/opt/fleet/gazebo/plugins"));
        assert_eq!(paths.models_dir, PathBuf::from("/opt/fleet/gazebo/models"));
        assert_eq!(paths.world_launch, PathBuf::from("/opt/fleet/gazebo/gazebo.launch"));
        assert_eq!(
            paths.spawn_launch,
            PathBuf::from("/opt/fleet/gazebo/single_vehicle_spawn.launch")
        );
    }

    #[test]
    fn test_container_names() {
        let config = LauncherConfig::default();
        assert_eq!(config.container_name(1), "sim-1");
        assert_eq!(config.container_name(12), "sim-12");
    }
}
