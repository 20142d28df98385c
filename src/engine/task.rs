//! engine::task
//!
//! The unit of asynchronous work.
//!
//! # Phases
//!
//! ```text
//! Created -> Queued -> Executing -> (Succeeded | Failed) -> Completed
//! ```
//!
//! - **Execution** runs once on a worker thread while the task's lock
//!   master is held.
//! - **Completion** runs once on the host thread with no lock held: exactly
//!   one of [`Task::on_success`] or [`Task::on_failure`].
//!
//! Inputs are validated before a task is constructed; a task that exists is
//! ready to submit.

use std::fmt;

use thiserror::Error;

use crate::git::EngineError;
use crate::lock::ResourceSet;

/// Lifecycle state of a task, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Queued,
    Executing,
    Succeeded,
    Failed,
    Completed,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Queued => "queued",
            TaskState::Executing => "executing",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
            TaskState::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Errors that reach a task's completion phase.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The engine reported a failure status.
    #[error("{}", describe_engine_error(.function, .error))]
    Engine {
        /// Operation name, e.g. `Repository.getReferences`
        function: &'static str,
        error: EngineError,
    },

    /// A multi-step traversal found state that contradicts earlier steps.
    #[error("{function}: {message}")]
    Inconsistent {
        function: &'static str,
        message: String,
    },

    /// The execution phase panicked.
    #[error("{function} panicked: {message}")]
    Panicked {
        function: &'static str,
        message: String,
    },
}

impl TaskError {
    /// Wrap an engine error for `function`.
    pub fn engine(function: &'static str, error: impl Into<EngineError>) -> Self {
        TaskError::Engine {
            function,
            error: error.into(),
        }
    }

    pub fn inconsistent(function: &'static str, message: impl Into<String>) -> Self {
        TaskError::Inconsistent {
            function,
            message: message.into(),
        }
    }

    /// The engine status code, when the error came from the engine.
    pub fn code(&self) -> Option<i32> {
        match self {
            TaskError::Engine { error, .. } => Some(error.code),
            _ => None,
        }
    }

    pub fn function(&self) -> &'static str {
        match self {
            TaskError::Engine { function, .. }
            | TaskError::Inconsistent { function, .. }
            | TaskError::Panicked { function, .. } => function,
        }
    }
}

/// A captured engine message wins over the bare status code.
fn describe_engine_error(function: &str, error: &EngineError) -> String {
    match error.message.as_deref() {
        Some(message) => message.to_string(),
        None => format!("{} has thrown an error (errno {})", function, error.code),
    }
}

/// A unit of work run by the [`Scheduler`](super::Scheduler).
///
/// # Example
///
/// ```
/// use latchwork::engine::{Task, TaskError};
/// use latchwork::lock::ResourceSet;
///
/// struct CountEntries {
///     resources: ResourceSet,
///     entries: Vec<u32>,
/// }
///
/// impl Task for CountEntries {
///     type Output = usize;
///
///     fn name(&self) -> &'static str {
///         "Example.countEntries"
///     }
///
///     fn resources(&self) -> &ResourceSet {
///         &self.resources
///     }
///
///     fn execute(&mut self) -> Result<usize, TaskError> {
///         Ok(self.entries.len())
///     }
///
///     fn on_success(self, count: usize) {
///         println!("{count} entries");
///     }
///
///     fn on_failure(self, error: TaskError) {
///         eprintln!("{error}");
///     }
/// }
/// ```
pub trait Task: Send + 'static {
    type Output: Send + 'static;

    /// Operation name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Native objects the execution phase touches.
    fn resources(&self) -> &ResourceSet;

    /// Execution phase. Runs on a worker thread with the resources locked.
    ///
    /// Native handles acquired here must be released before returning an
    /// error.
    fn execute(&mut self) -> Result<Self::Output, TaskError>;

    /// Success completion. Runs on the host thread.
    fn on_success(self, output: Self::Output);

    /// Failure completion. Runs on the host thread.
    fn on_failure(self, error: TaskError);
}

/// Completion callback carried by operation tasks.
pub type Callback<T> = Box<dyn FnOnce(Result<T, TaskError>) + Send + 'static>;

/// A task assembled from closures.
///
/// # Example
///
/// ```
/// use latchwork::engine::FnTask;
/// use latchwork::lock::ResourceSet;
///
/// let task = FnTask::new(
///     "Example.answer",
///     ResourceSet::new(),
///     || Ok(42),
///     |result| assert_eq!(result.unwrap(), 42),
/// );
/// # drop(task);
/// ```
pub struct FnTask<T, E> {
    name: &'static str,
    resources: ResourceSet,
    execute: E,
    complete: Callback<T>,
}

impl<T, E> FnTask<T, E>
where
    T: Send + 'static,
    E: FnMut() -> Result<T, TaskError> + Send + 'static,
{
    pub fn new<C>(name: &'static str, resources: ResourceSet, execute: E, complete: C) -> Self
    where
        C: FnOnce(Result<T, TaskError>) + Send + 'static,
    {
        Self {
            name,
            resources,
            execute,
            complete: Box::new(complete),
        }
    }
}

impl<T, E> Task for FnTask<T, E>
where
    T: Send + 'static,
    E: FnMut() -> Result<T, TaskError> + Send + 'static,
{
    type Output = T;

    fn name(&self) -> &'static str {
        self.name
    }

    fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    fn execute(&mut self) -> Result<T, TaskError> {
        (self.execute)()
    }

    fn on_success(self, output: T) {
        (self.complete)(Ok(output))
    }

    fn on_failure(self, error: TaskError) {
        (self.complete)(Err(error))
    }
}
