//! Fleet Environment Abstraction Layer
//!
//! This crate provides the seam between the fleet orchestration logic and
//! the outside world. Everything the launcher does to the host goes through
//! it:
//! - Running a command to completion (`run()`)
//! - Starting a background process (`spawn()`)
//! - Resolving a program on `PATH` (`locate()`)
//! - Waiting for operator cancellation (`CancelToken`)
//!
//! The production implementation (`TokioExecutor`) drives real processes
//! through `tokio::process`. A recording implementation lives in
//! `fleet_sim` and lets the same orchestration code run without touching
//! the host.
//!
//! # Example
//!
//! ```ignore
//! use fleet_env::{CommandExecutor, CommandSpec, TokioExecutor};
//!
//! let executor = TokioExecutor::shared();
//! let report = executor
//!     .run(&CommandSpec::new("docker").args(["kill", "sim-1"]))
//!     .await?;
//! assert!(report.success());
//! ```

mod cancel;
mod command;
mod error;
mod executor;
mod tokio_impl;
mod types;

pub use cancel::CancelToken;
pub use command::{CommandSpec, ExitReport};
pub use error::EnvError;
pub use executor::{ChildProcess, CommandExecutor};
pub use tokio_impl::{TokioChild, TokioExecutor};
pub use types::SessionId;
