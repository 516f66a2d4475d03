use super::types::{TerminationRequest, TerminationSource};
use crate::component::{Component, ComponentContext};
use crate::dispatcher::Dispatcher;
use crate::status::LifeCycleStatus;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One registration in the container
pub(crate) struct Entry {
    pub(crate) identifier: Option<Arc<str>>,
    pub(crate) label: Arc<str>,
    pub(crate) component: Arc<dyn Component>,
    pub(crate) instance: Arc<dyn Any + Send + Sync>,
    pub(crate) status: LifeCycleStatus,
}

/// Container state reachable from component contexts
pub(crate) struct Shared {
    pub(crate) entries: RwLock<Vec<Entry>>,
    /// Identifier → position in `entries`
    pub(crate) index: RwLock<Dispatcher<String, usize>>,
    termination: Mutex<Option<TerminationRequest>>,
    termination_token: CancellationToken,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            index: RwLock::new(Dispatcher::empty()),
            termination: Mutex::new(None),
            termination_token: CancellationToken::new(),
        }
    }

    pub(crate) fn status(&self, index: usize) -> LifeCycleStatus {
        self.entries
            .read()
            .get(index)
            .map(|entry| entry.status)
            .unwrap_or(LifeCycleStatus::Stopped)
    }

    pub(crate) fn set_status(&self, index: usize, status: LifeCycleStatus) {
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(index) {
            debug!(
                "Component '{}' state changed: {:?} -> {:?}",
                entry.label, entry.status, status
            );
            entry.status = status;
        }
    }

    /// Positions of every entry currently in `status`, in registration order
    pub(crate) fn positions_with(&self, status: LifeCycleStatus) -> Vec<usize> {
        self.entries
            .read()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.status == status)
            .map(|(index, _)| index)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Clone out what a lifecycle call needs so no lock is held across `.await`
    pub(crate) fn prepare(
        self: &Arc<Self>,
        index: usize,
    ) -> Option<(Arc<dyn Component>, ComponentContext)> {
        let entries = self.entries.read();
        let entry = entries.get(index)?;
        let ctx = ComponentContext::new(
            Arc::downgrade(self),
            index,
            entry.identifier.clone(),
            Arc::clone(&entry.label),
        );
        Some((Arc::clone(&entry.component), ctx))
    }

    pub(crate) fn label(&self, index: usize) -> String {
        self.entries
            .read()
            .get(index)
            .map(|entry| entry.label.to_string())
            .unwrap_or_default()
    }

    /// Record a termination request; only the first one is kept
    pub(crate) fn request_termination(
        &self,
        source: TerminationSource,
        reason: String,
        cause: Option<anyhow::Error>,
    ) -> bool {
        let mut slot = self.termination.lock();
        if let Some(existing) = slot.as_ref() {
            debug!(
                "Ignoring termination request from {}, already terminating: {}",
                source, existing.reason
            );
            return false;
        }

        let request = TerminationRequest::new(source, reason, cause);
        warn!("Termination requested: {}", request);
        *slot = Some(request);
        drop(slot);

        self.termination_token.cancel();
        true
    }

    pub(crate) fn termination_request(&self) -> Option<TerminationRequest> {
        self.termination.lock().clone()
    }

    pub(crate) fn is_termination_requested(&self) -> bool {
        self.termination_token.is_cancelled()
    }

    pub(crate) fn termination_token(&self) -> CancellationToken {
        self.termination_token.clone()
    }
}
