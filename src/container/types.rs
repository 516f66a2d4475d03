use chrono::{DateTime, Utc};
use std::fmt;

/// Who asked the container to terminate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationSource {
    /// A managed component, through its context
    Component(String),
    /// The hosting process
    Host,
    /// An operating system signal
    Signal(String),
}

impl fmt::Display for TerminationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSource::Component(name) => write!(f, "component {}", name),
            TerminationSource::Host => write!(f, "host"),
            TerminationSource::Signal(signal) => write!(f, "signal {}", signal),
        }
    }
}

/// The first termination request recorded by a container
#[derive(Debug, Clone)]
pub struct TerminationRequest {
    pub source: TerminationSource,
    pub reason: String,
    /// Rendered error chain of the cause, if one was supplied
    pub cause: Option<String>,
    pub requested_at: DateTime<Utc>,
}

impl TerminationRequest {
    pub fn new(source: TerminationSource, reason: String, cause: Option<anyhow::Error>) -> Self {
        Self {
            source,
            reason,
            cause: cause.map(|e| format!("{:#}", e)),
            requested_at: Utc::now(),
        }
    }
}

impl fmt::Display for TerminationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (requested by {})", self.reason, self.source)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}
