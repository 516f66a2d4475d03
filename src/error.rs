use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeelError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Component identifier '{identifier}' is already registered")]
    DuplicateIdentifier { identifier: String },

    #[error("Lookup of {type_name} is ambiguous: {candidates} anonymous components match")]
    AmbiguousComponent {
        type_name: &'static str,
        candidates: usize,
    },

    #[error("Component {component} failed to initialize: {source:#}{}", unwound(.unwind_failures))]
    Initialization {
        component: String,
        #[source]
        source: anyhow::Error,
        /// Components whose `stop()` failed while the container unwound
        unwind_failures: Vec<StopFailure>,
    },

    #[error("Component {component} failed to start: {source:#}{}", unwound(.unwind_failures))]
    Start {
        component: String,
        #[source]
        source: anyhow::Error,
        unwind_failures: Vec<StopFailure>,
    },

    #[error("{} component(s) failed to stop: {}", .failures.len(), summarize(.failures))]
    Stop { failures: Vec<StopFailure> },

    #[error("Startup interrupted by termination request: {reason}{}", unwound(.unwind_failures))]
    Terminated {
        reason: String,
        unwind_failures: Vec<StopFailure>,
    },

    #[error("Health manager is not running")]
    HealthManagerNotRunning,

    #[error("Health manager has been stopped")]
    HealthManagerStopped,

    #[error("System error: {message}")]
    System { message: String },
}

/// A component whose `stop()` failed or timed out during a shutdown sweep
#[derive(Error, Debug)]
#[error("{component} ({source:#})")]
pub struct StopFailure {
    pub component: String,
    #[source]
    pub source: anyhow::Error,
}

fn summarize(failures: &[StopFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn unwound(failures: &[StopFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(
            "; {} component(s) failed to stop while unwinding: {}",
            failures.len(),
            summarize(failures)
        )
    }
}

impl KeelError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn initialization<S: Into<String>>(
        component: S,
        source: anyhow::Error,
        unwind_failures: Vec<StopFailure>,
    ) -> Self {
        Self::Initialization {
            component: component.into(),
            source,
            unwind_failures,
        }
    }

    pub fn start<S: Into<String>>(
        component: S,
        source: anyhow::Error,
        unwind_failures: Vec<StopFailure>,
    ) -> Self {
        Self::Start {
            component: component.into(),
            source,
            unwind_failures,
        }
    }

    /// Names of the components that failed to stop, either in a shutdown
    /// sweep or while a failed startup was unwound
    pub fn failed_components(&self) -> Vec<&str> {
        match self {
            Self::Stop { failures }
            | Self::Initialization {
                unwind_failures: failures,
                ..
            }
            | Self::Start {
                unwind_failures: failures,
                ..
            }
            | Self::Terminated {
                unwind_failures: failures,
                ..
            } => failures.iter().map(|f| f.component.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeelError>;
