//! engine::scheduler
//!
//! Runs task execution phases on a bounded worker pool.
//!
//! # Architecture
//!
//! The pool is the blocking pool of a dedicated tokio runtime, capped at
//! `worker_threads`. Tasks beyond the cap wait in the pool's queue
//! (`Queued`). A worker then:
//!
//! 1. acquires the task's [`LockMaster`] (may block on contended keys),
//! 2. runs [`Task::execute`] (`Executing`),
//! 3. drops the lock master,
//! 4. hands the completion to the [`Dispatcher`].
//!
//! Locks are never held while a completion runs.
//!
//! # Invariants
//!
//! - Every submitted task reaches its completion phase exactly once,
//!   including when `execute` panics.
//! - Execution phases are never cancelled; dropping the scheduler waits for
//!   the ones already submitted.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use thiserror::Error;

use super::dispatcher::{Completion, CompletionSender, Dispatcher};
use super::task::{Task, TaskError, TaskId, TaskState};
use crate::lock::{LockContext, LockMaster};

/// Hard upper bound on the worker pool.
pub const MAX_WORKER_THREADS: usize = 64;

/// Errors from building a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("worker pool size must be between 1 and {max}, got {requested}")]
    InvalidPoolSize { requested: usize, max: usize },

    #[error("failed to start worker pool: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub worker_threads: usize,
}

impl SchedulerConfig {
    pub fn with_workers(worker_threads: usize) -> Self {
        Self { worker_threads }
    }
}

impl Default for SchedulerConfig {
    /// Available parallelism, capped at 8.
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(8);
        Self {
            worker_threads: workers,
        }
    }
}

/// Count of execution phases not yet finished.
#[derive(Debug, Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn enter(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn leave(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Submits tasks to the worker pool.
///
/// # Example
///
/// ```
/// use latchwork::engine::{Dispatcher, FnTask, Scheduler, SchedulerConfig};
/// use latchwork::lock::{LockRegistry, Resource, ResourceKind, ResourceSet, ThreadSafety};
///
/// let registry = LockRegistry::initialize_global(ThreadSafety::Enabled);
/// let mut dispatcher = Dispatcher::new();
/// let scheduler = Scheduler::new(
///     registry.initialize_context(),
///     &dispatcher,
///     SchedulerConfig::with_workers(2),
/// )
/// .unwrap();
///
/// let repo = Resource::root(ResourceKind::Repository);
/// scheduler.submit(FnTask::new(
///     "Example.answer",
///     ResourceSet::new().with(&repo),
///     || Ok(42),
///     |result| assert_eq!(result.unwrap(), 42),
/// ));
///
/// dispatcher.run_until_idle();
/// ```
pub struct Scheduler {
    runtime: Option<tokio::runtime::Runtime>,
    context: LockContext,
    completions: CompletionSender,
    outstanding: Arc<Outstanding>,
    next_id: AtomicU64,
    worker_threads: usize,
}

impl Scheduler {
    /// Start a worker pool whose completions go to `dispatcher`.
    pub fn new(
        context: LockContext,
        dispatcher: &Dispatcher,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerError> {
        if config.worker_threads == 0 || config.worker_threads > MAX_WORKER_THREADS {
            return Err(SchedulerError::InvalidPoolSize {
                requested: config.worker_threads,
                max: MAX_WORKER_THREADS,
            });
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_name("latchwork-worker")
            .build()?;

        tracing::debug!(
            context = %context.id(),
            workers = config.worker_threads,
            "scheduler started"
        );

        Ok(Self {
            runtime: Some(runtime),
            context,
            completions: dispatcher.sender(),
            outstanding: Arc::new(Outstanding::default()),
            next_id: AtomicU64::new(1),
            worker_threads: config.worker_threads,
        })
    }

    /// Queue `task` and return immediately.
    ///
    /// Its completion phase runs later on the thread driving the
    /// dispatcher.
    pub fn submit<T: Task>(&self, task: T) -> TaskId {
        let id = TaskId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(task = %id, name = task.name(), state = %TaskState::Queued, "submitted");

        self.completions.track();
        self.outstanding.enter();

        let context = self.context.clone();
        let completions = self.completions.clone();
        let outstanding = Arc::clone(&self.outstanding);
        let job = move || {
            let completion = execute_task(id, task, &context);
            completions.send(completion);
            outstanding.leave();
        };

        self.runtime
            .as_ref()
            .expect("runtime is only taken by drop")
            .spawn_blocking(job);
        id
    }

    /// Execution phases submitted and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    /// Block until every submitted execution phase has finished.
    ///
    /// Completions may still be waiting in the dispatcher.
    pub fn wait_idle(&self) {
        self.outstanding.wait_idle();
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn context(&self) -> &LockContext {
        &self.context
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.outstanding.wait_idle();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        tracing::debug!(context = %self.context.id(), "scheduler stopped");
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("context", &self.context.id())
            .field("worker_threads", &self.worker_threads)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Worker-side half of a task: lock, execute, unlock, package completion.
fn execute_task<T: Task>(id: TaskId, mut task: T, context: &LockContext) -> Completion {
    let name = task.name();

    let result = {
        let master = LockMaster::acquire(context, true, task.resources());
        tracing::debug!(task = %id, name, keys = ?master.keys(), state = %TaskState::Executing, "executing");
        let result = panic::catch_unwind(AssertUnwindSafe(|| task.execute()));
        drop(master);
        result
    };

    let outcome = result.unwrap_or_else(|payload| {
        Err(TaskError::Panicked {
            function: name,
            message: panic_message(payload.as_ref()),
        })
    });

    let run: Box<dyn FnOnce() + Send> = match outcome {
        Ok(output) => {
            tracing::debug!(task = %id, name, state = %TaskState::Succeeded, "execution finished");
            Box::new(move || task.on_success(output))
        }
        Err(error) => {
            tracing::debug!(task = %id, name, state = %TaskState::Failed, %error, "execution finished");
            Box::new(move || task.on_failure(error))
        }
    };

    Completion { task: id, run }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FnTask;
    use crate::lock::{LockRegistry, Resource, ResourceKind, ResourceSet, ThreadSafety};
    use std::sync::Mutex;
    use std::thread;

    fn setup(workers: usize) -> (Dispatcher, Scheduler, LockContext) {
        let context = LockRegistry::initialize_global(ThreadSafety::Enabled).initialize_context();
        let dispatcher = Dispatcher::new();
        let scheduler = Scheduler::new(
            context.clone(),
            &dispatcher,
            SchedulerConfig::with_workers(workers),
        )
        .expect("scheduler");
        (dispatcher, scheduler, context)
    }

    #[test]
    fn rejects_empty_pool() {
        let context = LockRegistry::initialize_global(ThreadSafety::Enabled).initialize_context();
        let dispatcher = Dispatcher::new();
        let err = Scheduler::new(context, &dispatcher, SchedulerConfig::with_workers(0)).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidPoolSize { requested: 0, .. }));
    }

    #[test]
    fn completion_runs_on_host_thread() {
        let (mut dispatcher, scheduler, _ctx) = setup(2);
        let host = thread::current().id();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..4 {
            let exec_seen = Arc::clone(&seen);
            let done_seen = Arc::clone(&seen);
            scheduler.submit(FnTask::new(
                "Test.threads",
                ResourceSet::new(),
                move || {
                    exec_seen.lock().unwrap().push(("exec", thread::current().id()));
                    Ok(())
                },
                move |_| done_seen.lock().unwrap().push(("done", thread::current().id())),
            ));
        }

        dispatcher.run_until_idle();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 8);
        for (phase, thread) in seen.iter() {
            match *phase {
                "exec" => assert_ne!(*thread, host),
                _ => assert_eq!(*thread, host),
            }
        }
    }

    #[test]
    fn panicking_task_fails_and_releases_keys() {
        let (mut dispatcher, scheduler, ctx) = setup(1);
        let repo = Resource::root(ResourceKind::Repository);
        let outcome = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&outcome);
        scheduler.submit(FnTask::new(
            "Test.panic",
            ResourceSet::new().with(&repo),
            || -> Result<(), TaskError> { panic!("native call exploded") },
            move |result| *sink.lock().unwrap() = Some(result),
        ));

        dispatcher.run_until_idle();
        let outcome = outcome.lock().unwrap().take().expect("completion ran");
        match outcome {
            Err(TaskError::Panicked { function, message }) => {
                assert_eq!(function, "Test.panic");
                assert!(message.contains("exploded"));
            }
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
        assert_eq!(ctx.diagnostics().stored_keys, 0);
    }

    #[test]
    fn scheduler_locks_in_its_own_context() {
        let (mut dispatcher, scheduler, ctx) = setup(1);
        assert_eq!(scheduler.context().id(), ctx.id());

        let repo = Resource::root(ResourceKind::Repository);
        let key = repo.lock_key().unwrap();
        let held = Arc::new(Mutex::new(false));
        let sink = Arc::clone(&held);
        let seen_from_worker = ctx.clone();
        scheduler.submit(FnTask::new(
            "Test.context",
            ResourceSet::new().with(&repo),
            move || Ok::<_, TaskError>(seen_from_worker.contains(key)),
            move |result| *sink.lock().unwrap() = result.unwrap(),
        ));
        dispatcher.run_until_idle();

        assert!(*held.lock().unwrap());
        assert_eq!(scheduler.context().diagnostics().stored_keys, 0);
    }

    #[test]
    fn failure_reaches_on_failure_once() {
        let (mut dispatcher, scheduler, _ctx) = setup(1);
        let calls = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&calls);
        scheduler.submit(FnTask::new(
            "Test.fail",
            ResourceSet::new(),
            || Err::<u32, _>(TaskError::inconsistent("Test.fail", "lookup vanished")),
            move |result| sink.lock().unwrap().push(result.map_err(|e| e.to_string())),
        ));

        dispatcher.run_until_idle();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![Err("Test.fail: lookup vanished".to_string())]
        );
    }

    #[test]
    fn locks_are_released_before_completion() {
        let (mut dispatcher, scheduler, ctx) = setup(1);
        let repo = Resource::root(ResourceKind::Repository);
        let key = repo.lock_key().unwrap();
        let held_during_completion = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&held_during_completion);
        let observer = ctx.clone();
        scheduler.submit(FnTask::new(
            "Test.release",
            ResourceSet::new().with(&repo),
            || Ok(()),
            move |_| *sink.lock().unwrap() = Some(observer.contains(key)),
        ));

        dispatcher.run_until_idle();
        assert_eq!(*held_during_completion.lock().unwrap(), Some(false));
    }

    #[test]
    fn drop_waits_for_submitted_work() {
        let (mut dispatcher, scheduler, _ctx) = setup(1);
        let finished = Arc::new(Mutex::new(0));

        for _ in 0..5 {
            let finished = Arc::clone(&finished);
            scheduler.submit(FnTask::new(
                "Test.drain",
                ResourceSet::new(),
                move || {
                    thread::sleep(std::time::Duration::from_millis(5));
                    *finished.lock().unwrap() += 1;
                    Ok(())
                },
                |_| {},
            ));
        }

        drop(scheduler);
        assert_eq!(*finished.lock().unwrap(), 5);
        assert_eq!(dispatcher.run_pending(), 5);
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
