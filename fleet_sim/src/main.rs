//! Fleet Simulator CLI
//!
//! Launches N copters on a grid and keeps them running until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use fleet_core::{FleetError, FleetOrchestrator, FleetPaths, FleetReport, FleetRequest, GridCell, GridLayout, LauncherConfig};
use fleet_env::{CancelToken, CommandExecutor, TokioExecutor};
use fleet_sim::cli::Args;
use fleet_sim::{RecordingExecutor, ShutdownSignals};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Exit code for rejected arguments.
const EXIT_USAGE: i32 = 2;

/// Exit code for a missing simulator integration.
const EXIT_MISSING_DEPENDENCY: i32 = 1;

/// Exit code when a second shutdown signal aborts cleanup.
const EXIT_ABORTED: i32 = 130;

async fn run_fleet<E: CommandExecutor>(
    executor: Arc<E>,
    paths: FleetPaths,
    config: LauncherConfig,
    request: &FleetRequest,
    cancel: CancelToken,
) -> Result<FleetReport, FleetError> {
    let mut orchestrator = FleetOrchestrator::new(executor, paths, config);
    orchestrator.run(request, cancel).await
}

/// Directory of the running binary; collaborators live next to it.
fn default_root() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("cannot resolve the launcher's own path")?;
    exe.parent()
        .map(|dir| dir.to_path_buf())
        .context("launcher binary has no parent directory")
}

fn print_plan(request: &FleetRequest) -> anyhow::Result<()> {
    let layout = GridLayout::plan(request.count());
    let cells: Vec<GridCell> = layout.cells(request.count(), request.spacing()).collect();
    let plan = serde_json::json!({
        "request": request,
        "layout": layout,
        "cells": cells,
    });
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let request = match args.request() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_USAGE);
        }
    };

    let root = match &args.root {
        Some(root) => root.clone(),
        None => default_root()?,
    };
    let paths = FleetPaths::from_root(&root);
    let config = LauncherConfig {
        runtime: args.runtime.clone(),
        ..LauncherConfig::default()
    };

    if args.json {
        print_plan(&request)?;
    }

    let cancel = CancelToken::new();
    let signals = ShutdownSignals::install().context("failed to install shutdown signal handlers")?;
    let forwarded = cancel.clone();
    tokio::spawn(async move {
        signals.forward(forwarded).await;
        std::process::exit(EXIT_ABORTED);
    });

    let result = if args.dry_run {
        info!("Dry run: commands are logged, not executed");
        let executor = Arc::new(RecordingExecutor::new().with_echo());
        let result = run_fleet(executor.clone(), paths, config, &request, cancel).await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&executor.commands())?);
        }
        result
    } else {
        run_fleet(TokioExecutor::shared(), paths, config, &request, cancel).await
    };

    match result {
        Ok(report) => {
            info!(
                "Fleet terminated: {} launched, {} failed to launch, {} stopped, {} cleanup failures",
                report.launched, report.launch_failures, report.stopped, report.cleanup_failures
            );
            Ok(())
        }
        Err(FleetError::MissingDependency(msg)) => {
            error!("{}", msg);
            std::process::exit(EXIT_MISSING_DEPENDENCY);
        }
        Err(FleetError::InvalidRequest(msg)) => {
            eprintln!("Error: {}", msg);
            std::process::exit(EXIT_USAGE);
        }
        Err(e) => Err(e.into()),
    }
}
