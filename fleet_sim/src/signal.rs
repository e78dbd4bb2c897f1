//! Operator interrupt adapter: turns Ctrl+C / SIGTERM into a cancelled token.
//!
//! Handlers are registered by [`ShutdownSignals::install`], before the
//! fleet starts, so an early signal is never lost to the default action.
//! The first signal cancels the run; a second one ends
//! [`ShutdownSignals::forward`] so the caller can abort a stuck cleanup.

use fleet_env::CancelToken;
use std::io;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered shutdown signal handlers.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignals {
    /// Registers the Ctrl+C (and, on unix, SIGTERM) handlers now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            return Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            });
        }

        #[cfg(not(unix))]
        {
            return Ok(Self {});
        }
    }

    /// Waits for the next shutdown signal.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => {},
                _ = self.terminate.recv() => {},
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(?err, "failed to wait for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }

    /// Cancels `cancel` on the first signal, then returns on the second.
    pub async fn forward(mut self, cancel: CancelToken) {
        self.recv().await;
        info!("Shutdown signal received, cleaning up (signal again to abort)");
        cancel.cancel();

        self.recv().await;
        warn!("Second shutdown signal received, aborting cleanup");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn send_sigterm() {
        // SAFETY: kill(2) on our own pid has no memory-safety preconditions.
        let rc = unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
        assert_eq!(rc, 0);
    }

    #[tokio::test]
    async fn test_first_signal_cancels_second_aborts() {
        let signals = ShutdownSignals::install().unwrap();
        let cancel = CancelToken::new();
        let forward = tokio::spawn(signals.forward(cancel.clone()));

        // Handlers are live before the forwarding task has been polled
        send_sigterm();
        tokio::time::timeout(Duration::from_secs(5), cancel.cancelled())
            .await
            .unwrap();
        assert!(!forward.is_finished());

        send_sigterm();
        tokio::time::timeout(Duration::from_secs(5), forward)
            .await
            .unwrap()
            .unwrap();
    }
}
