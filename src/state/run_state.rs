/// Run state definitions for the control loop
///
/// A run starts `Running`, moves to `ShuttingDown` once the cancellation
/// signal has fired, and ends `Stopped` after the traversal and the consumer
/// have both exited.
use std::fmt;

/// Represents the lifecycle state of one crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Traversal and consumer are active
    Running,

    /// Cancellation has fired; in-flight work is unwinding
    ShuttingDown,

    /// Traversal and consumer have both exited
    Stopped,
}

impl RunState {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Staying in the same non-terminal state is allowed so repeated
    /// shutdown requests are harmless.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Running)
                | (Self::Running, Self::ShuttingDown)
                | (Self::ShuttingDown, Self::ShuttingDown)
                | (Self::ShuttingDown, Self::Stopped)
        )
    }

    /// Returns the lowercase name used in logs and in stored run records
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
