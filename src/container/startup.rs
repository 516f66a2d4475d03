use super::ComponentContainer;
use crate::error::{KeelError, Result, StopFailure};
use crate::status::LifeCycleStatus;
use tracing::{error, info, warn};

impl ComponentContainer {
    /// Run `init()` on every `New` component in registration order.
    ///
    /// The first failure moves that component to `Stopped`, unwinds the
    /// container and is returned. Initialization is not retried.
    pub async fn initialize_all(&self) -> Result<()> {
        let _sweep = self.sweep.lock().await;
        info!("Initializing components");

        let pending = self.shared.positions_with(LifeCycleStatus::New);
        for &position in &pending {
            let Some((component, ctx)) = self.shared.prepare(position) else {
                continue;
            };

            self.shared
                .set_status(position, LifeCycleStatus::Initializing);

            if let Err(e) = component.init(&ctx).await {
                error!("Failed to initialize {} component: {:#}", ctx.label(), e);
                self.shared.set_status(position, LifeCycleStatus::Stopped);
                let unwind_failures = self.unwind().await;
                return Err(KeelError::initialization(ctx.label(), e, unwind_failures));
            }

            self.shared
                .set_status(position, LifeCycleStatus::Initialized);
        }

        info!("{} component(s) initialized", pending.len());
        Ok(())
    }

    /// Run `start()` on every `Initialized` component in registration order.
    ///
    /// A failure is fatal to the whole container: the failing component goes
    /// straight to `Stopped`, every component that already reached `Started`
    /// is stopped in reverse order, and the failure is returned carrying any
    /// `stop()` failures from that unwind. A
    /// termination request observed once a component has finished starting
    /// ends the forward sweep the same way.
    pub async fn start_all(&self) -> Result<()> {
        let _sweep = self.sweep.lock().await;
        info!("Starting components");

        let uninitialized = self.shared.positions_with(LifeCycleStatus::New);
        if !uninitialized.is_empty() {
            warn!(
                "{} component(s) were never initialized and will not be started",
                uninitialized.len()
            );
        }

        if let Some(err) = self.interrupted_by_termination().await {
            return Err(err);
        }

        let pending = self.shared.positions_with(LifeCycleStatus::Initialized);
        for &position in &pending {
            let Some((component, ctx)) = self.shared.prepare(position) else {
                continue;
            };

            self.shared.set_status(position, LifeCycleStatus::Starting);

            if let Err(e) = component.start(&ctx).await {
                error!("Failed to start {} component: {:#}", ctx.label(), e);
                self.shared.set_status(position, LifeCycleStatus::Stopped);
                let unwind_failures = self.unwind().await;
                return Err(KeelError::start(ctx.label(), e, unwind_failures));
            }

            self.shared.set_status(position, LifeCycleStatus::Started);
            info!("{} component started", ctx.label());

            if let Some(err) = self.interrupted_by_termination().await {
                return Err(err);
            }
        }

        info!("{} component(s) started", pending.len());
        Ok(())
    }

    /// `initialize_all` followed by `start_all`
    pub async fn startup(&self) -> Result<()> {
        self.initialize_all().await?;
        self.start_all().await
    }

    /// Unwind the started subset if a termination request is pending
    async fn interrupted_by_termination(&self) -> Option<KeelError> {
        let request = self.shared.termination_request()?;
        warn!("Startup interrupted: {}", request);
        let unwind_failures = self.unwind().await;
        Some(KeelError::Terminated {
            reason: request.reason,
            unwind_failures,
        })
    }

    /// Stop whatever already started after a fatal forward-progress error.
    /// Stop failures ride along on the returned startup error.
    async fn unwind(&self) -> Vec<StopFailure> {
        let failures = self.stop_sweep().await;
        if !failures.is_empty() {
            warn!(
                "{} component(s) failed to stop while unwinding",
                failures.len()
            );
        }
        failures
    }
}
