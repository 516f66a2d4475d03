pub mod component;
pub mod config;
pub mod container;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod logging;
pub mod status;

pub use component::{Component, ComponentContext};
pub use config::{ContainerConfig, HealthConfig, KeelConfig, LogFormat, LoggingConfig};
pub use container::{Assembly, AssemblyContext, ComponentContainer, TerminationRequest, TerminationSource};
pub use dispatcher::Dispatcher;
pub use error::{KeelError, Result, StopFailure};
pub use health::{HealthManager, HealthMetrics, HealthMonitorable, MonitorReport};
pub use status::LifeCycleStatus;
