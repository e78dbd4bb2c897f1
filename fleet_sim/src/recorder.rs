//! Recording executor with fault injection.
//!
//! Implements `CommandExecutor` without touching the host: every command is
//! appended to a shared log, background children are simulated, and
//! failures can be injected either by matching command text or at a seeded
//! rate.

use async_trait::async_trait;
use fleet_env::{ChildProcess, CommandExecutor, CommandSpec, EnvError, ExitReport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::info;

/// What the executor was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommandKind {
    /// Run to completion
    Run,
    /// Start in the background
    Spawn,
    /// Graceful stop of a spawned child
    Interrupt,
    /// Hard kill of a spawned child
    Kill,
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCommand {
    pub kind: CommandKind,

    /// The command (for interrupt/kill: the child's spawn command)
    pub command: CommandSpec,
}

type RunHook = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// Failure injection rules.
#[derive(Default)]
struct FaultPlan {
    /// Commands whose text contains one of these fragments fail
    failing: Vec<String>,

    /// Seeded random failures: (rng, probability)
    random: Option<(ChaCha8Rng, f64)>,
}

impl FaultPlan {
    fn should_fail(&mut self, command: &CommandSpec) -> bool {
        let text = command.to_string();
        if self.failing.iter().any(|fragment| text.contains(fragment.as_str())) {
            return true;
        }
        match &mut self.random {
            Some((rng, rate)) => rng.gen_bool(*rate),
            None => false,
        }
    }
}

/// Executor that records commands instead of running them.
pub struct RecordingExecutor {
    log: Arc<Mutex<Vec<RecordedCommand>>>,
    faults: Mutex<FaultPlan>,
    missing: HashSet<String>,
    on_run: Option<RunHook>,
    echo: bool,
    stubborn_children: bool,
    next_pid: AtomicU32,

    /// Flipped to make every spawned child exit on its own
    children_exit: watch::Sender<bool>,
}

impl RecordingExecutor {
    /// Creates an executor where every command succeeds and every program
    /// is available.
    pub fn new() -> Self {
        let (children_exit, _) = watch::channel(false);
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            faults: Mutex::new(FaultPlan::default()),
            missing: HashSet::new(),
            on_run: None,
            echo: false,
            stubborn_children: false,
            next_pid: AtomicU32::new(1000),
            children_exit,
        }
    }

    /// Logs every command at `info` level as it is recorded.
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Makes commands containing `fragment` fail.
    pub fn fail_matching(self, fragment: impl Into<String>) -> Self {
        self.faults.lock().unwrap().failing.push(fragment.into());
        self
    }

    /// Fails commands at random with probability `rate`, reproducibly from `seed`.
    pub fn with_failure_rate(self, seed: u64, rate: f64) -> Self {
        self.faults.lock().unwrap().random = Some((ChaCha8Rng::seed_from_u64(seed), rate.clamp(0.0, 1.0)));
        self
    }

    /// Pretends `program` is not installed.
    pub fn without_program(mut self, program: impl Into<String>) -> Self {
        self.missing.insert(program.into());
        self
    }

    /// Calls `hook` for every `run()` before it is recorded.
    pub fn on_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.on_run = Some(Box::new(hook));
        self
    }

    /// Spawned children ignore interrupts and only die when killed.
    pub fn with_stubborn_children(mut self) -> Self {
        self.stubborn_children = true;
        self
    }

    /// Makes every spawned child exit on its own.
    pub fn exit_children(&self) {
        self.children_exit.send_replace(true);
    }

    /// Snapshot of everything recorded so far.
    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.log.lock().unwrap().clone()
    }

    /// Recorded commands of one kind.
    pub fn commands_of(&self, kind: CommandKind) -> Vec<CommandSpec> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.command.clone())
            .collect()
    }

    /// Number of recorded commands of `kind` whose text contains `fragment`.
    pub fn count_matching(&self, kind: CommandKind, fragment: &str) -> usize {
        self.commands_of(kind)
            .iter()
            .filter(|c| c.to_string().contains(fragment))
            .count()
    }

    fn record(&self, kind: CommandKind, command: &CommandSpec) {
        if self.echo {
            info!("[dry-run] {:?}: {}", kind, command);
        }
        record_into(&self.log, kind, command);
    }
}

fn record_into(log: &Mutex<Vec<RecordedCommand>>, kind: CommandKind, command: &CommandSpec) {
    log.lock().unwrap().push(RecordedCommand {
        kind,
        command: command.clone(),
    });
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for RecordingExecutor {
    async fn run(&self, command: &CommandSpec) -> Result<ExitReport, EnvError> {
        if let Some(hook) = &self.on_run {
            hook(command);
        }
        self.record(CommandKind::Run, command);

        if self.faults.lock().unwrap().should_fail(command) {
            return Ok(ExitReport::with_code(1));
        }
        Ok(ExitReport::ok())
    }

    async fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, EnvError> {
        self.record(CommandKind::Spawn, command);

        if self.faults.lock().unwrap().should_fail(command) {
            return Err(EnvError::rejected(format!("injected spawn failure: {}", command)));
        }

        Ok(Box::new(RecordingChild {
            command: command.clone(),
            pid: self.next_pid.fetch_add(1, Ordering::Relaxed),
            log: Arc::clone(&self.log),
            stubborn: self.stubborn_children,
            exit_rx: self.children_exit.subscribe(),
            exited: None,
        }))
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing.contains(program) {
            None
        } else {
            Some(PathBuf::from(program))
        }
    }
}

/// A simulated background process.
pub struct RecordingChild {
    command: CommandSpec,
    pid: u32,
    log: Arc<Mutex<Vec<RecordedCommand>>>,
    stubborn: bool,
    exit_rx: watch::Receiver<bool>,
    exited: Option<ExitReport>,
}

#[async_trait]
impl ChildProcess for RecordingChild {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    async fn wait(&mut self) -> Result<ExitReport, EnvError> {
        if let Some(report) = self.exited {
            return Ok(report);
        }
        if self.exit_rx.wait_for(|exit| *exit).await.is_err() {
            // Executor dropped: nothing will ever stop this child
            std::future::pending::<()>().await;
        }
        let report = ExitReport::ok();
        self.exited = Some(report);
        Ok(report)
    }

    async fn interrupt(&mut self) -> Result<(), EnvError> {
        record_into(&self.log, CommandKind::Interrupt, &self.command);
        if self.exited.is_none() && !self.stubborn {
            self.exited = Some(ExitReport::signalled());
        }
        Ok(())
    }

    async fn kill(&mut self) -> Result<(), EnvError> {
        record_into(&self.log, CommandKind::Kill, &self.command);
        if self.exited.is_none() {
            self.exited = Some(ExitReport::signalled());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_records_runs_in_order() {
        let executor = RecordingExecutor::new();
        executor.run(&CommandSpec::new("run").arg("-i=1")).await.unwrap();
        executor.run(&CommandSpec::new("docker").args(["kill", "sim-1"])).await.unwrap();

        let runs = executor.commands_of(CommandKind::Run);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].to_string(), "docker kill sim-1");
    }

    #[tokio::test]
    async fn test_fail_matching_returns_non_zero_exit() {
        let executor = RecordingExecutor::new().fail_matching("-i=2");

        let ok = executor.run(&CommandSpec::new("run").arg("-i=1")).await.unwrap();
        let failed = executor.run(&CommandSpec::new("run").arg("-i=2")).await.unwrap();

        assert!(ok.success());
        assert!(!failed.success());
        assert_eq!(executor.count_matching(CommandKind::Run, "run"), 2);
    }

    #[tokio::test]
    async fn test_seeded_failures_are_reproducible() {
        async fn outcomes(seed: u64) -> Vec<bool> {
            let executor = RecordingExecutor::new().with_failure_rate(seed, 0.5);
            let mut results = Vec::new();
            for i in 0..32 {
                let report = executor.run(&CommandSpec::new("run").arg(format!("-i={}", i))).await.unwrap();
                results.push(report.success());
            }
            results
        }

        assert_eq!(outcomes(42).await, outcomes(42).await);
        assert!(outcomes(42).await.iter().any(|ok| !ok));
    }

    #[tokio::test]
    async fn test_missing_program_is_not_located() {
        let executor = RecordingExecutor::new().without_program("roslaunch");
        assert!(executor.locate("roslaunch").is_none());
        assert_eq!(executor.locate("docker"), Some(PathBuf::from("docker")));
    }

    #[tokio::test]
    async fn test_child_waits_until_told_to_exit() {
        let executor = RecordingExecutor::new();
        let mut child = executor.spawn(&CommandSpec::new("roslaunch")).await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), child.wait()).await;
        assert!(pending.is_err());

        executor.exit_children();
        let report = child.wait().await.unwrap();
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_interrupt_and_kill_are_recorded() {
        let executor = RecordingExecutor::new().with_stubborn_children();
        let mut child = executor.spawn(&CommandSpec::new("roslaunch")).await.unwrap();

        child.interrupt().await.unwrap();
        let still_running = tokio::time::timeout(Duration::from_millis(20), child.wait()).await;
        assert!(still_running.is_err());

        child.kill().await.unwrap();
        assert!(!child.wait().await.unwrap().success());

        assert_eq!(executor.commands_of(CommandKind::Interrupt).len(), 1);
        assert_eq!(executor.commands_of(CommandKind::Kill).len(), 1);
    }
}
