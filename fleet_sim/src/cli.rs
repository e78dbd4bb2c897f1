//! Command-line arguments.

use clap::Parser;
use fleet_core::{FleetError, FleetRequest, DEFAULT_BASE_PORT};
use std::path::PathBuf;
use thiserror::Error;

/// Rejections of numeric CLI values.
#[derive(Debug, Error, PartialEq)]
pub enum ArgError {
    #[error("{0} is an invalid value, must be positive")]
    NotPositive(String),

    #[error("{0} is not a number")]
    NotANumber(String),

    #[error("{0} is too large")]
    TooLarge(String),
}

/// Parses a strictly positive integer.
pub fn positive_int(value: &str) -> Result<u32, ArgError> {
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| ArgError::NotANumber(value.to_string()))?;
    if parsed <= 0 {
        return Err(ArgError::NotPositive(value.to_string()));
    }
    u32::try_from(parsed).map_err(|_| ArgError::TooLarge(value.to_string()))
}

/// Parses a strictly positive, finite float.
pub fn positive_float(value: &str) -> Result<f64, ArgError> {
    let parsed: f64 = value
        .trim()
        .parse()
        .map_err(|_| ArgError::NotANumber(value.to_string()))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(ArgError::NotPositive(value.to_string()));
    }
    Ok(parsed)
}

/// Simulate multiple Clover copters
#[derive(Parser, Debug)]
#[command(name = "fleet-sim")]
#[command(about = "Simulate multiple Clover copters", long_about = None)]
pub struct Args {
    /// Number of copters to simulate
    #[arg(short, long, default_value = "1", value_parser = positive_int)]
    pub number: u32,

    /// UDP port of the first copter; copter n uses <port> + n - 1 (non-headless only)
    #[arg(short, long, default_value_t = DEFAULT_BASE_PORT, value_parser = positive_int)]
    pub port: u32,

    /// Distance between copters in meters; copters form a near-square grid along East and North
    #[arg(short, long, default_value = "1", value_parser = positive_float)]
    pub dist: f64,

    /// Run the internal lightweight simulation inside each container
    #[arg(long)]
    pub headless: bool,

    /// Directory holding the `run` script and the `gazebo/` tree (default: next to this binary)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Container runtime used to stop instances
    #[arg(long, default_value = "docker")]
    pub runtime: String,

    /// Log the commands instead of executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the computed layout as JSON before launching
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Builds the validated fleet request.
    pub fn request(&self) -> Result<FleetRequest, FleetError> {
        FleetRequest::new(self.number, self.port, self.dist, self.headless)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["fleet-sim"]).unwrap();
        assert_eq!(args.number, 1);
        assert_eq!(args.port, 14601);
        assert_eq!(args.dist, 1.0);
        assert!(!args.headless);
        assert_eq!(args.runtime, "docker");
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from(["fleet-sim", "-n", "5", "-p", "15000", "-d", "2.5", "--headless"]).unwrap();
        let request = args.request().unwrap();
        assert_eq!(request.count(), 5);
        assert_eq!(request.base_port(), 15000);
        assert_eq!(request.spacing(), 2.5);
        assert!(request.headless());
    }

    #[test]
    fn test_non_positive_values_are_usage_errors() {
        for argv in [
            vec!["fleet-sim", "-n", "0"],
            vec!["fleet-sim", "--number=-3"],
            vec!["fleet-sim", "-p", "0"],
            vec!["fleet-sim", "-d", "0"],
            vec!["fleet-sim", "--dist=-1.5"],
        ] {
            let err = Args::try_parse_from(argv.clone()).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{:?}", argv);
        }
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(positive_int("7"), Ok(7));
        assert_eq!(positive_int("0"), Err(ArgError::NotPositive("0".into())));
        assert_eq!(positive_int("abc"), Err(ArgError::NotANumber("abc".into())));
        assert_eq!(positive_int("99999999999"), Err(ArgError::TooLarge("99999999999".into())));

        assert_eq!(positive_float("0.5"), Ok(0.5));
        assert_eq!(positive_float("inf"), Err(ArgError::NotPositive("inf".into())));
        assert_eq!(positive_float("NaN"), Err(ArgError::NotPositive("NaN".into())));
    }
}
