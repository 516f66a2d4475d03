use crate::container::{Shared, TerminationSource};
use crate::status::LifeCycleStatus;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tracing::debug;

/// A long-lived unit managed by the [`ComponentContainer`](crate::ComponentContainer).
///
/// Every lifecycle hook is optional; a component that overrides none of them
/// is still a valid registration. The container never calls hooks of the
/// same component concurrently.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Human readable name used in logs and errors for anonymous registrations
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Prepare internal state; runs once during `initialize_all`
    async fn init(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Acquire resources and begin work; runs once during `start_all`
    async fn start(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Release resources; runs during a shutdown sweep if the component started
    async fn stop(&self, _ctx: &ComponentContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A component's view of its own registration entry.
///
/// The context holds a weak reference to the container, so a component
/// keeping a clone of it (for example inside a spawned task) never keeps the
/// container alive.
#[derive(Clone)]
pub struct ComponentContext {
    shared: Weak<Shared>,
    index: usize,
    identifier: Option<Arc<str>>,
    label: Arc<str>,
}

impl ComponentContext {
    pub(crate) fn new(
        shared: Weak<Shared>,
        index: usize,
        identifier: Option<Arc<str>>,
        label: Arc<str>,
    ) -> Self {
        Self {
            shared,
            index,
            identifier,
            label,
        }
    }

    /// Last transition recorded by the container; `Stopped` once the container is gone
    pub fn status(&self) -> LifeCycleStatus {
        self.shared
            .upgrade()
            .map(|shared| shared.status(self.index))
            .unwrap_or(LifeCycleStatus::Stopped)
    }

    /// Identifier the component was registered under, `None` when anonymous
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Identifier when present, otherwise the component name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Ask the container to shut down.
    ///
    /// Returns immediately. The request is only recorded here; the shutdown
    /// sweep runs on the task awaiting [`ComponentContainer::run`](crate::ComponentContainer::run),
    /// or a `start_all` in progress is cut short. A host that never calls
    /// `run()` has to check
    /// [`termination_request`](crate::ComponentContainer::termination_request)
    /// and call `stop_all()` itself. Returns `false` when an earlier request
    /// was already recorded or the container no longer exists.
    pub fn request_termination(
        &self,
        reason: impl Into<String>,
        cause: Option<anyhow::Error>,
    ) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.request_termination(
                TerminationSource::Component(self.label.to_string()),
                reason.into(),
                cause,
            ),
            None => {
                debug!(
                    "Termination requested by {} after the container was dropped",
                    self.label
                );
                false
            }
        }
    }

    pub fn is_termination_requested(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.is_termination_requested())
            .unwrap_or(true)
    }
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("index", &self.index)
            .field("label", &self.label)
            .field("status", &self.status())
            .finish()
    }
}
