use serde::{Deserialize, Serialize};

/// Lifecycle stages a managed component passes through, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifeCycleStatus {
    New,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl LifeCycleStatus {
    /// Every status in canonical order
    pub const ALL: [LifeCycleStatus; 7] = [
        LifeCycleStatus::New,
        LifeCycleStatus::Initializing,
        LifeCycleStatus::Initialized,
        LifeCycleStatus::Starting,
        LifeCycleStatus::Started,
        LifeCycleStatus::Stopping,
        LifeCycleStatus::Stopped,
    ];

    /// True iff `self` occurs strictly earlier than `other`
    pub fn is_before(self, other: LifeCycleStatus) -> bool {
        self < other
    }

    pub fn is_terminal(self) -> bool {
        self == LifeCycleStatus::Stopped
    }
}
