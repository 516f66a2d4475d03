use super::state::Shared;
use super::types::{TerminationRequest, TerminationSource};
use super::ComponentContainer;
use crate::error::{KeelError, Result};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl ComponentContainer {
    /// Ask the container to shut down on behalf of the hosting process.
    ///
    /// Idempotent: only the first request is recorded, later calls return
    /// `false`. Never blocks; the shutdown sweep runs on the task driving
    /// [`run`](Self::run), so nothing is stopped unless `run()` is awaited.
    pub fn request_termination(
        &self,
        reason: impl Into<String>,
        cause: Option<anyhow::Error>,
    ) -> bool {
        self.shared
            .request_termination(TerminationSource::Host, reason.into(), cause)
    }

    /// Run until termination is requested, then stop every component.
    ///
    /// Termination comes from a component context, from
    /// [`request_termination`](Self::request_termination) or, when
    /// `handle_signals` is configured, from SIGINT/SIGTERM. Returns the
    /// request that ended the run, or the aggregate of stop failures.
    pub async fn run(&self) -> Result<TerminationRequest> {
        info!("Component container is running");

        let token = self.shared.termination_token();
        if self.config.handle_signals {
            setup_signal_handlers(Arc::downgrade(&self.shared), token.clone());
        }

        token.cancelled().await;

        let request = self
            .shared
            .termination_request()
            .ok_or_else(|| KeelError::system("Termination signalled without a recorded request"))?;

        info!("Shutdown initiated: {}", request);
        self.stop_all().await?;

        info!("Component container shutdown complete");
        Ok(request)
    }
}

/// Set up signal handlers that turn SIGINT/SIGTERM into termination requests
fn setup_signal_handlers(shared: Weak<Shared>, token: CancellationToken) {
    // Handle SIGTERM (systemd stop) - Unix only
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let shared = shared.clone();
        let token = token.clone();
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = token.cancelled() => {}
                Some(()) = sigterm.recv() => {
                    info!("Received SIGTERM signal");
                    signal_termination(&shared, "SIGTERM");
                }
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            Ok(()) = tokio::signal::ctrl_c() => {
                info!("Received SIGINT signal (Ctrl+C)");
                signal_termination(&shared, "SIGINT");
            }
        }
    });
}

fn signal_termination(shared: &Weak<Shared>, signal: &str) {
    if let Some(shared) = shared.upgrade() {
        shared.request_termination(
            TerminationSource::Signal(signal.to_string()),
            format!("received {}", signal),
            None,
        );
    }
}
