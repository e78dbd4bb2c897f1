//! Production implementation of CommandExecutor using Tokio.

use crate::command::{CommandSpec, ExitReport};
use crate::error::EnvError;
use crate::executor::{ChildProcess, CommandExecutor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tracing::debug;

/// Production executor backed by `tokio::process`.
///
/// Children inherit stdout/stderr so the output of the external tools stays
/// visible to the operator.
pub struct TokioExecutor {
    /// Search path used by `locate()`; `None` means the process `PATH`
    search_path: Option<Vec<PathBuf>>,
}

impl TokioExecutor {
    /// Creates a new TokioExecutor.
    pub fn new() -> Self {
        Self { search_path: None }
    }

    /// Creates an executor that resolves programs against `dirs` instead of `PATH`.
    pub fn with_search_path(dirs: Vec<PathBuf>) -> Self {
        Self {
            search_path: Some(dirs),
        }
    }

    /// Creates an Arc-wrapped executor for sharing across components.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        command
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        match &self.search_path {
            Some(dirs) => dirs.clone(),
            None => std::env::var_os("PATH")
                .map(|path| std::env::split_paths(&path).collect())
                .unwrap_or_default(),
        }
    }
}

impl Default for TokioExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for TokioExecutor {
    async fn run(&self, spec: &CommandSpec) -> Result<ExitReport, EnvError> {
        debug!("run: {}", spec);
        let status = Self::command(spec)
            .status()
            .await
            .map_err(|e| EnvError::spawn(&spec.program, e))?;
        Ok(status.into())
    }

    async fn spawn(&self, spec: &CommandSpec) -> Result<Box<dyn ChildProcess>, EnvError> {
        debug!("spawn: {}", spec);
        let child = Self::command(spec)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EnvError::spawn(&spec.program, e))?;
        Ok(Box::new(TokioChild::new(child)))
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            return is_executable(candidate).then(|| candidate.to_path_buf());
        }

        self.search_dirs()
            .into_iter()
            .map(|dir| dir.join(program))
            .find(|path| is_executable(path))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// A real child process.
pub struct TokioChild {
    child: Child,

    /// Pid captured at spawn; tokio forgets it once the child is reaped
    pid: Option<u32>,

    /// Exit status once the child has been reaped
    exited: Option<ExitReport>,
}

impl TokioChild {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            exited: None,
        }
    }
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    async fn wait(&mut self) -> Result<ExitReport, EnvError> {
        if let Some(report) = self.exited {
            return Ok(report);
        }
        let report: ExitReport = self.child.wait().await?.into();
        self.exited = Some(report);
        Ok(report)
    }

    async fn interrupt(&mut self) -> Result<(), EnvError> {
        if self.exited.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            let pid = self.pid.ok_or_else(|| EnvError::rejected("child has no pid"))?;
            // SAFETY: kill(2) has no memory-safety preconditions.
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
            if rc != 0 {
                return Err(EnvError::Signal {
                    pid,
                    source: std::io::Error::last_os_error(),
                });
            }
            return Ok(());
        }

        #[cfg(not(unix))]
        {
            return self.kill().await;
        }
    }

    async fn kill(&mut self) -> Result<(), EnvError> {
        if self.exited.is_some() {
            return Ok(());
        }
        self.child.kill().await?;
        self.exited = Some(ExitReport::signalled());
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_reports_exit_codes() {
        let executor = TokioExecutor::new();

        let ok = executor.run(&CommandSpec::new("true")).await.unwrap();
        assert!(ok.success());

        let failed = executor.run(&CommandSpec::new("false")).await.unwrap();
        assert_eq!(failed.code, Some(1));
    }

    #[tokio::test]
    async fn test_run_passes_environment() {
        let executor = TokioExecutor::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "test \"$FLEET_PROBE\" = yes"])
            .env("FLEET_PROBE", "yes");

        assert!(executor.run(&spec).await.unwrap().success());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let executor = TokioExecutor::new();
        let err = executor
            .run(&CommandSpec::new("/definitely/not/a/program"))
            .await
            .unwrap_err();

        assert!(matches!(err, EnvError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_interrupt_stops_background_child() {
        let executor = TokioExecutor::new();
        let mut child = executor
            .spawn(&CommandSpec::new("sleep").arg("30"))
            .await
            .unwrap();
        assert!(child.id().is_some());

        child.interrupt().await.unwrap();
        let report = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!report.success());

        // Reaped children ignore further signals
        child.interrupt().await.unwrap();
        child.kill().await.unwrap();
    }

    #[test]
    fn test_locate_uses_search_path() {
        let executor = TokioExecutor::with_search_path(vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")]);
        assert!(executor.locate("sh").is_some());
        assert!(executor.locate("no-such-launcher-binary").is_none());

        let empty = TokioExecutor::with_search_path(Vec::new());
        assert!(empty.locate("sh").is_none());
    }
}
