//! Error types for tasks, the scheduler, the job registry and configuration.

use crate::scheduler::TaskId;
use std::fmt;

/// Terminal error of a single task.
///
/// A `TaskError` is recorded in the failing task's result slot. It never
/// escapes the scheduler's control loop; callers see it when they retrieve
/// the task's result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Error raised by user code inside a step
    #[error("{kind}: {message}")]
    Raised {
        /// Error category, e.g. `ValueError`
        kind: String,
        /// Human-readable message
        message: String,
    },

    /// A step panicked; the payload message is preserved when it is a string
    #[error("task panicked: {0}")]
    Panicked(String),

    /// Task was cancelled before completion
    #[error("task cancelled")]
    Cancelled,

    /// Scheduler was torn down while the task was outstanding
    #[error("scheduler shut down before task completed")]
    SchedulerShutdown,
}

impl TaskError {
    /// Build a [`TaskError::Raised`] error.
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        TaskError::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Error category: the `kind` of a raised error, or the variant name.
    pub fn kind(&self) -> &str {
        match self {
            TaskError::Raised { kind, .. } => kind,
            TaskError::Panicked(_) => "Panicked",
            TaskError::Cancelled => "Cancelled",
            TaskError::SchedulerShutdown => "SchedulerShutdown",
        }
    }

    /// Whether this is the cancellation terminal result.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

/// Errors collected by a fail-fast run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateError {
    /// Failed tasks with their errors, in the order they were observed
    pub errors: Vec<(TaskId, TaskError)>,
}

impl AggregateError {
    /// Number of collected failures.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no failure was collected.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} task(s) failed", self.errors.len())?;
        for (id, err) in &self.errors {
            write!(f, "; task {}: {}", id, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Errors produced by the scheduler's own control loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Awaited tasks can never make progress
    #[error("scheduler stalled: {waiting} task(s) waiting with nothing left to wake them")]
    Stalled {
        /// Number of non-terminal tasks that were being waited on
        waiting: usize,
    },

    /// Handle does not belong to this scheduler
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// The task's result was already moved out
    #[error("result of task {0} was already taken")]
    ResultTaken(TaskId),

    /// The same handle appears more than once in a run request
    #[error("task {0} requested more than once")]
    DuplicateHandle(TaskId),

    /// One or more tasks failed under the fail-fast policy
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Errors produced by the job registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A job with this name is already registered
    #[error("job already registered: {0}")]
    Duplicate(String),

    /// No job registered under this name
    #[error("unknown job: {0}")]
    Unknown(String),
}

/// Errors produced while loading a scheduler configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but semantically invalid
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result of a finished task.
pub type Outcome<T> = Result<T, TaskError>;

/// Scheduler result alias.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raised_display() {
        let err = TaskError::raised("ValueError", "bad input");
        assert_eq!(err.to_string(), "ValueError: bad input");
        assert_eq!(err.kind(), "ValueError");
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_cancelled_kind() {
        assert_eq!(TaskError::Cancelled.kind(), "Cancelled");
        assert!(TaskError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_aggregate_display() {
        let agg = AggregateError {
            errors: vec![(TaskId::from_u64(7), TaskError::Cancelled)],
        };
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.to_string(), "1 task(s) failed; task 7: task cancelled");

        let err: SchedulerError = agg.into();
        assert!(matches!(err, SchedulerError::Aggregate(_)));
    }
}
