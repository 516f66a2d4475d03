use super::state::Shared;
use super::types::TerminationRequest;
use crate::config::ContainerConfig;
use crate::status::LifeCycleStatus;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the component registry and drives every registered component
/// through its lifecycle.
///
/// Registration order is the dependency order: components start in the
/// order they were registered and stop in exactly the reverse order. The
/// container is an ordinary value owned by the process entry point; there is
/// no global instance.
///
/// Termination requests are only acted on by [`run`](Self::run) (and by a
/// `start_all` still in progress). After `startup()` the host is expected to
/// await `run()`; otherwise a recorded request stays pending until the host
/// calls `stop_all()` itself.
pub struct ComponentContainer {
    pub(super) config: ContainerConfig,
    pub(super) shared: Arc<Shared>,
    /// Serialises initialize/start/stop sweeps
    pub(super) sweep: Mutex<()>,
}

impl ComponentContainer {
    /// Create an empty container with the given configuration
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new()),
            sweep: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Number of registered components
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current status of the component registered under `identifier`
    pub fn status_of(&self, identifier: &str) -> Option<LifeCycleStatus> {
        let index = self.shared.index.read().dispatch(identifier).copied()?;
        Some(self.shared.status(index))
    }

    /// Snapshot of every component's label and status, in registration order
    pub fn statuses(&self) -> Vec<(String, LifeCycleStatus)> {
        self.shared
            .entries
            .read()
            .iter()
            .map(|entry| (entry.label.to_string(), entry.status))
            .collect()
    }

    /// The recorded termination request, if any
    pub fn termination_request(&self) -> Option<TerminationRequest> {
        self.shared.termination_request()
    }

    pub fn is_termination_requested(&self) -> bool {
        self.shared.is_termination_requested()
    }
}

impl Default for ComponentContainer {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}
