mod assembly;
mod orchestrator;
mod registry;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use assembly::{Assembly, AssemblyContext};
pub use orchestrator::ComponentContainer;
pub(crate) use state::Shared;
pub use types::{TerminationRequest, TerminationSource};
