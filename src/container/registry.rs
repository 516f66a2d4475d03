use super::state::Entry;
use super::ComponentContainer;
use crate::component::Component;
use crate::error::{KeelError, Result};
use crate::status::LifeCycleStatus;
use std::any::{type_name, Any};
use std::sync::Arc;
use tracing::{debug, warn};

impl ComponentContainer {
    /// Register a component, optionally under a unique identifier.
    ///
    /// The new entry starts in `New`. Registering a second component under an
    /// identifier that is already present fails and leaves the registry
    /// unchanged.
    pub fn register<C: Component>(&self, identifier: Option<&str>, component: Arc<C>) -> Result<()> {
        let mut entries = self.shared.entries.write();

        if let Some(identifier) = identifier {
            if self.shared.index.read().contains(identifier) {
                warn!("Rejected duplicate component identifier '{}'", identifier);
                return Err(KeelError::DuplicateIdentifier {
                    identifier: identifier.to_string(),
                });
            }
        }

        let position = entries.len();
        let label: Arc<str> = match identifier {
            Some(identifier) => Arc::from(identifier),
            None => Arc::from(component.name()),
        };
        let instance: Arc<dyn Any + Send + Sync> = component.clone();
        entries.push(Entry {
            identifier: identifier.map(Arc::from),
            label: Arc::clone(&label),
            component,
            instance,
            status: LifeCycleStatus::New,
        });

        if let Some(identifier) = identifier {
            // take the table out so it is grown in place instead of copied
            let mut index = self.shared.index.write();
            let current = std::mem::take(&mut *index);
            *index = current.into_with(identifier.to_string(), position);
        }

        debug!("Registered component '{}' at position {}", label, position);
        Ok(())
    }

    /// The component registered under `identifier`
    pub fn lookup(&self, identifier: &str) -> Option<Arc<dyn Component>> {
        let position = self.shared.index.read().dispatch(identifier).copied()?;
        self.shared
            .entries
            .read()
            .get(position)
            .map(|entry| Arc::clone(&entry.component))
    }

    /// The component registered under `identifier`, if it is a `T`
    pub fn lookup_as<T: Component>(&self, identifier: &str) -> Option<Arc<T>> {
        let position = self.shared.index.read().dispatch(identifier).copied()?;
        let instance = self
            .shared
            .entries
            .read()
            .get(position)
            .map(|entry| Arc::clone(&entry.instance))?;
        instance.downcast::<T>().ok()
    }

    /// The single anonymous component of type `T`.
    ///
    /// Fails with `AmbiguousComponent` when more than one anonymous
    /// registration of `T` exists. Identified registrations are reached through
    /// [`lookup`](Self::lookup) and are not considered here.
    pub fn lookup_by_type<T: Component>(&self) -> Result<Option<Arc<T>>> {
        let candidates: Vec<Arc<dyn Any + Send + Sync>> = self
            .shared
            .entries
            .read()
            .iter()
            .filter(|entry| entry.identifier.is_none() && (*entry.instance).is::<T>())
            .map(|entry| Arc::clone(&entry.instance))
            .collect();

        match candidates.len() {
            0 => Ok(None),
            1 => Ok(candidates.into_iter().next().and_then(|c| c.downcast::<T>().ok())),
            count => Err(KeelError::AmbiguousComponent {
                type_name: type_name::<T>(),
                candidates: count,
            }),
        }
    }
}
