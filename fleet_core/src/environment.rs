//! Environment Configurator - search paths and home position for the simulator.
//!
//! The simulator discovers plugins, models and shared libraries through
//! path-list variables, and reads the vehicles' home position from two
//! fixed coordinates. Instead of mutating the launcher's own process
//! environment, the configurator builds an immutable [`EnvironmentConfig`]
//! once at startup; it is then layered onto every simulator command.

use crate::request::FleetPaths;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use tracing::{info, warn};

/// Plugin search path read by the simulator.
pub const GAZEBO_PLUGIN_PATH: &str = "GAZEBO_PLUGIN_PATH";

/// Model search path read by the simulator.
pub const GAZEBO_MODEL_PATH: &str = "GAZEBO_MODEL_PATH";

/// Dynamic library search path (plugins link against each other).
pub const LD_LIBRARY_PATH: &str = "LD_LIBRARY_PATH";

/// Home latitude variable of the flight stack.
pub const PX4_HOME_LAT: &str = "PX4_HOME_LAT";

/// Home longitude variable of the flight stack.
pub const PX4_HOME_LON: &str = "PX4_HOME_LON";

/// Fixed home latitude (degrees).
pub const HOME_LATITUDE: f64 = 55.7031751;

/// Fixed home longitude (degrees).
pub const HOME_LONGITUDE: f64 = 37.7248118;

/// Platform path-list delimiter.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

/// Environment variables handed to the simulator, in a fixed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentConfig {
    vars: BTreeMap<String, String>,
}

impl EnvironmentConfig {
    /// Value assigned to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Iterates `(name, value)` pairs sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Converts an inherited raw value. A non-UTF-8 value is kept in lossy
/// form so its entries are still appended to, never dropped.
fn inherited_value(name: &str, raw: Option<OsString>) -> Option<String> {
    match raw?.into_string() {
        Ok(value) => Some(value),
        Err(raw) => {
            warn!("{} is not valid UTF-8, using {:?}", name, raw);
            Some(raw.to_string_lossy().into_owned())
        }
    }
}

/// Builds an [`EnvironmentConfig`] on top of an inherited environment.
pub struct EnvironmentConfigurator {
    inherited: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    vars: BTreeMap<String, String>,
}

impl EnvironmentConfigurator {
    /// Starts from the launcher's own process environment.
    pub fn from_process() -> Self {
        Self::with_inherited(|name| inherited_value(name, std::env::var_os(name)))
    }

    /// Starts from an empty environment.
    pub fn empty() -> Self {
        Self::with_inherited(|_| None)
    }

    /// Starts from a custom lookup of inherited values.
    pub fn with_inherited<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            inherited: Box::new(lookup),
            vars: BTreeMap::new(),
        }
    }

    /// Current value of `name`: configured here, else inherited, else empty.
    fn current(&self, name: &str) -> String {
        self.vars
            .get(name)
            .cloned()
            .or_else(|| (self.inherited)(name))
            .unwrap_or_default()
    }

    /// Appends `path` to the path-list variable `name`.
    ///
    /// An empty variable becomes exactly `path`; otherwise `path` goes after
    /// [`PATH_LIST_SEPARATOR`].
    pub fn append_search_path(&mut self, name: &str, path: impl AsRef<Path>) -> &mut Self {
        let path = path.as_ref().display().to_string();
        let mut value = self.current(name);
        if value.is_empty() {
            value = path;
        } else {
            value.push(PATH_LIST_SEPARATOR);
            value.push_str(&path);
        }
        info!("Set {} to {}", name, value);
        self.vars.insert(name.to_string(), value);
        self
    }

    /// Sets `name` to `value`, replacing any inherited value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        info!("Set {} to {}", name, value);
        self.vars.insert(name.to_string(), value);
        self
    }

    /// Registers everything the simulator needs to find the fleet's
    /// plugins and models, plus the fixed home position.
    pub fn configure_simulator(&mut self, paths: &FleetPaths) -> &mut Self {
        self.append_search_path(GAZEBO_PLUGIN_PATH, &paths.plugins_dir)
            .append_search_path(GAZEBO_MODEL_PATH, &paths.models_dir)
            .append_search_path(LD_LIBRARY_PATH, &paths.plugins_dir)
            .set(PX4_HOME_LAT, HOME_LATITUDE.to_string())
            .set(PX4_HOME_LON, HOME_LONGITUDE.to_string())
    }

    /// Freezes the configured variables.
    pub fn finish(self) -> EnvironmentConfig {
        EnvironmentConfig { vars: self.vars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_to_empty_sets_exact_path() {
        let mut configurator = EnvironmentConfigurator::empty();
        configurator.append_search_path("FLEET_TEST_PATH", "/a");
        let config = configurator.finish();

        assert_eq!(config.get("FLEET_TEST_PATH"), Some("/a"));
    }

    #[test]
    fn test_append_twice_joins_with_separator() {
        let mut configurator = EnvironmentConfigurator::empty();
        configurator
            .append_search_path("FLEET_TEST_PATH", "/a")
            .append_search_path("FLEET_TEST_PATH", "/b");
        let config = configurator.finish();

        let expected = format!("/a{}/b", PATH_LIST_SEPARATOR);
        assert_eq!(config.get("FLEET_TEST_PATH"), Some(expected.as_str()));
    }

    #[test]
    fn test_append_keeps_inherited_value() {
        let mut configurator = EnvironmentConfigurator::with_inherited(|name| {
            (name == LD_LIBRARY_PATH).then(|| "/usr/local/lib".to_string())
        });
        configurator.append_search_path(LD_LIBRARY_PATH, "/opt/plugins");
        let config = configurator.finish();

        let expected = format!("/usr/local/lib{}/opt/plugins", PATH_LIST_SEPARATOR);
        assert_eq!(config.get(LD_LIBRARY_PATH), Some(expected.as_str()));
    }

    #[test]
    fn test_empty_inherited_value_is_treated_as_unset() {
        let mut configurator = EnvironmentConfigurator::with_inherited(|_| Some(String::new()));
        configurator.append_search_path(GAZEBO_MODEL_PATH, "/m");
        assert_eq!(configurator.finish().get(GAZEBO_MODEL_PATH), Some("/m"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_inherited_value_is_appended_to() {
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(b"/usr/lib:/opt/caf\xe9".to_vec());
        let mut configurator =
            EnvironmentConfigurator::with_inherited(move |name| inherited_value(name, Some(raw.clone())));
        configurator.append_search_path(LD_LIBRARY_PATH, "/opt/plugins");
        let value = configurator.finish().get(LD_LIBRARY_PATH).map(str::to_string);

        let value = value.unwrap();
        assert!(value.starts_with("/usr/lib:/opt/caf"));
        assert!(value.ends_with(":/opt/plugins"));
    }

    #[test]
    fn test_unset_inherited_value() {
        assert_eq!(inherited_value(LD_LIBRARY_PATH, None), None);
        assert_eq!(
            inherited_value(LD_LIBRARY_PATH, Some(OsString::from("/usr/lib"))),
            Some("/usr/lib".to_string())
        );
    }

    #[test]
    fn test_configure_simulator() {
        let paths = FleetPaths::from_root("/fleet");
        let mut configurator = EnvironmentConfigurator::empty();
        configurator.configure_simulator(&paths);
        let config = configurator.finish();

        assert_eq!(config.len(), 5);
        assert_eq!(config.get(GAZEBO_PLUGIN_PATH), Some("/fleet/gazebo/plugins"));
        assert_eq!(config.get(GAZEBO_MODEL_PATH), Some("/fleet/gazebo/models"));
        assert_eq!(config.get(LD_LIBRARY_PATH), Some("/fleet/gazebo/plugins"));
        assert_eq!(config.get(PX4_HOME_LAT), Some("55.7031751"));
        assert_eq!(config.get(PX4_HOME_LON), Some("37.7248118"));
    }

    #[test]
    fn test_configuring_does_not_touch_process_environment() {
        let mut configurator = EnvironmentConfigurator::from_process();
        configurator.set("FLEET_CORE_UNSET_PROBE", "1");
        let _ = configurator.finish();

        assert!(std::env::var("FLEET_CORE_UNSET_PROBE").is_err());
    }
}
