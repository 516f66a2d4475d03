use super::ComponentContainer;
use crate::component::Component;
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// Something that knows which components make up an application.
///
/// Implementations add components in dependency order: a component is added
/// only after every component it depends on.
pub trait Assembly {
    fn assemble(&self, ctx: &mut AssemblyContext<'_>) -> Result<()>;
}

/// Registration surface handed to an [`Assembly`]
pub struct AssemblyContext<'a> {
    container: &'a ComponentContainer,
    added: usize,
}

impl<'a> AssemblyContext<'a> {
    pub(super) fn new(container: &'a ComponentContainer) -> Self {
        Self {
            container,
            added: 0,
        }
    }

    /// Add a component under a unique identifier
    pub fn add_component<C: Component>(
        &mut self,
        identifier: &str,
        component: Arc<C>,
    ) -> Result<()> {
        self.container.register(Some(identifier), component)?;
        self.added += 1;
        Ok(())
    }

    /// Add a component without an identifier; it is reachable by type only
    pub fn add_anonymous_component<C: Component>(&mut self, component: Arc<C>) -> Result<()> {
        self.container.register(None, component)?;
        self.added += 1;
        Ok(())
    }

    /// Fetch a previously added component to wire it into a later one
    pub fn get<T: Component>(&self, identifier: &str) -> Option<Arc<T>> {
        self.container.lookup_as::<T>(identifier)
    }

    /// Number of components added through this context
    pub fn added(&self) -> usize {
        self.added
    }
}

impl ComponentContainer {
    /// Open an assembly context over this container
    pub fn assembly(&self) -> AssemblyContext<'_> {
        AssemblyContext::new(self)
    }

    /// Let `assembly` register its components; returns how many were added
    pub fn assemble<A: Assembly + ?Sized>(&self, assembly: &A) -> Result<usize> {
        let mut ctx = self.assembly();
        assembly.assemble(&mut ctx)?;
        info!("Assembled {} component(s)", ctx.added());
        Ok(ctx.added())
    }
}
