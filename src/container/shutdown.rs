use super::ComponentContainer;
use crate::error::{KeelError, Result, StopFailure};
use crate::status::LifeCycleStatus;
use tokio::time::timeout;
use tracing::{debug, error, info};

impl ComponentContainer {
    /// Stop every started component in strict reverse registration order.
    ///
    /// A failing or timed out `stop()` does not halt the sweep; every other
    /// component still gets to stop. All failures are returned together once
    /// the sweep completes. Components that never reached `Started` move
    /// straight to `Stopped` without their `stop()` being called.
    pub async fn stop_all(&self) -> Result<()> {
        let _sweep = self.sweep.lock().await;
        let failures = self.stop_sweep().await;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(KeelError::Stop { failures })
        }
    }

    /// Sweep body; callers hold the sweep lock
    pub(super) async fn stop_sweep(&self) -> Vec<StopFailure> {
        info!("Beginning graceful shutdown");
        let mut failures = Vec::new();

        for position in (0..self.shared.len()).rev() {
            let status = self.shared.status(position);

            if status == LifeCycleStatus::Started {
                if let Err(failure) = self.stop_component(position).await {
                    failures.push(failure);
                }
            } else if status.is_before(LifeCycleStatus::Started) {
                debug!(
                    "{} component never started, marking stopped",
                    self.shared.label(position)
                );
                self.shared.set_status(position, LifeCycleStatus::Stopped);
            }
        }

        info!(
            "Graceful shutdown completed with {} failure(s)",
            failures.len()
        );
        failures
    }

    /// Stop a specific component
    async fn stop_component(&self, position: usize) -> std::result::Result<(), StopFailure> {
        let Some((component, ctx)) = self.shared.prepare(position) else {
            return Ok(());
        };
        let stop_timeout = self.config.stop_timeout();

        info!("Stopping {} component", ctx.label());
        self.shared.set_status(position, LifeCycleStatus::Stopping);

        let outcome = timeout(stop_timeout, component.stop(&ctx)).await;
        self.shared.set_status(position, LifeCycleStatus::Stopped);

        match outcome {
            Ok(Ok(())) => {
                info!("{} component stopped", ctx.label());
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Error stopping {} component: {:#}", ctx.label(), e);
                Err(StopFailure {
                    component: ctx.label().to_string(),
                    source: e,
                })
            }
            Err(_) => {
                error!("{} component stop timeout", ctx.label());
                Err(StopFailure {
                    component: ctx.label().to_string(),
                    source: anyhow::anyhow!("stop timed out after {:?}", stop_timeout),
                })
            }
        }
    }
}
