//! engine
//!
//! Asynchronous task pipeline.
//!
//! # Architecture
//!
//! ```text
//!  host thread                      worker pool
//!  ───────────                      ───────────
//!  Scheduler::submit ──queue──▶  LockMaster::acquire
//!                                 Task::execute
//!                                 drop LockMaster
//!  Dispatcher::run_* ◀──channel── completion
//!  Task::on_success / on_failure
//! ```
//!
//! # Invariants
//!
//! - Locks are held only while an execution phase runs
//! - Every submitted task completes exactly once, on the thread driving the
//!   dispatcher
//! - Execution phases whose lock keys intersect never overlap

pub mod dispatcher;
pub mod scheduler;
pub mod task;

pub use dispatcher::Dispatcher;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerError, MAX_WORKER_THREADS};
pub use task::{Callback, FnTask, Task, TaskError, TaskId, TaskState};
