//! Shutdown trigger on SIGINT / SIGTERM.

/// Listens for the first interrupt or termination signal.
///
/// Handlers are installed by [`ShutdownSignal::install`], so a signal that
/// arrives while the container is still starting is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignal {
    /// Install the handlers. Must be called from within a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        let interrupt = signal(SignalKind::interrupt())
            .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGINT handler"))
            .ok();
        let terminate = signal(SignalKind::terminate())
            .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGTERM handler"))
            .ok();

        Self {
            interrupt,
            terminate,
        }
    }

    #[cfg(not(unix))]
    pub fn install() -> Self {
        Self {}
    }

    /// Resolve on the first signal received.
    #[cfg(unix)]
    pub async fn recv(self) {
        let Self {
            interrupt,
            terminate,
        } = self;

        tokio::select! {
            _ = wait_for(interrupt) => tracing::debug!("Received SIGINT"),
            _ = wait_for(terminate) => tracing::debug!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

/// A handler that failed to install never fires.
#[cfg(unix)]
async fn wait_for(signal: Option<tokio::signal::unix::Signal>) {
    match signal {
        Some(mut signal) => {
            signal.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_resolves_recv() {
        let shutdown = ShutdownSignal::install();
        // SAFETY: raising a signal on our own process; a handler is installed above.
        unsafe {
            libc::raise(libc::SIGTERM);
        }
        tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
            .await
            .expect("shutdown should resolve after SIGTERM");
    }
}
