//! Fleet Simulator Launcher
//!
//! Command-line front end for `fleet_core`, plus the pieces that let the
//! orchestrator run without touching the host:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       fleet-sim                          │
//! │   Args ──► FleetRequest ──► FleetOrchestrator<E>         │
//! │                                  │                       │
//! │              ┌───────────────────┴──────────┐            │
//! │              ▼                              ▼            │
//! │        TokioExecutor                RecordingExecutor    │
//! │   (run, docker, roslaunch)     (--dry-run, tests, faults)│
//! │                                                          │
//! │   Ctrl+C / SIGTERM ──► CancelToken ──► CleaningUp        │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod cli;
mod recorder;
mod signal;

pub use recorder::{CommandKind, RecordedCommand, RecordingChild, RecordingExecutor};
pub use signal::ShutdownSignals;
